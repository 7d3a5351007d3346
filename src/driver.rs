use crate::chain_event::ChainEvent;
use crate::consumer::ChainConsumer;
use crate::stream_state::Sequenced;

use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn dispatch<C: ChainConsumer>(consumer: &mut C, event: &ChainEvent) -> anyhow::Result<()> {
    match event {
        ChainEvent::Start {
            first_block,
            last_block,
        } => consumer.start(*first_block, *last_block),
        ChainEvent::StartBlock {
            header,
            chain_offset,
        } => consumer.start_block(header, *chain_offset),
        ChainEvent::StartTx { tx, hash } => consumer.start_tx(tx, hash),
        ChainEvent::StartInput { input } => consumer.start_input(input),
        ChainEvent::Edge { edge } => consumer.edge(edge),
        ChainEvent::EndOutput { output } => consumer.end_output(output),
        ChainEvent::EndTx { tx } => consumer.end_tx(tx),
        ChainEvent::EndBlock { offset } => consumer.end_block(*offset),
        ChainEvent::Wrapup => consumer.wrapup(),
    }
}

/// Feeds `events` into `consumer` in order, with the nesting order enforced.
///
/// Stops as soon as the consumer reports it is finished and runs `wrapup`
/// if the stream ends without one. On the first error the consumer is
/// aborted (flushing what it already produced) and the error is returned.
pub fn replay<C, I>(consumer: C, events: I) -> anyhow::Result<C>
where
    C: ChainConsumer,
    I: IntoIterator<Item = anyhow::Result<ChainEvent>>,
{
    let mut consumer = Sequenced::new(consumer);

    for (number, event) in events.into_iter().enumerate() {
        if consumer.is_finished() {
            tracing::debug!("consumer finished, dropping the rest of the stream at event {number}");
            break;
        }
        let result = event.and_then(|event| dispatch(&mut consumer, &event));
        if let Err(err) = result {
            if let Err(abort_err) = consumer.abort() {
                tracing::warn!("can't flush output after fatal error: {:?}", abort_err);
            }
            return Err(err.context(format!("processing stopped at event {number}")));
        }
    }

    if !consumer.is_finished() {
        if let Err(err) = consumer.wrapup() {
            if let Err(abort_err) = consumer.abort() {
                tracing::warn!("can't flush output after fatal error: {:?}", abort_err);
            }
            return Err(err);
        }
    }

    Ok(consumer.into_inner())
}

/// Reads the decoder's hand-off file: one JSON encoded `ChainEvent` per line.
pub fn read_events(path: &Path) -> anyhow::Result<impl Iterator<Item = anyhow::Result<ChainEvent>>> {
    let file = File::open(path)
        .with_context(|| format!("can't open events file {path}", path = path.display()))?;
    let lines = BufReader::new(file).lines();
    Ok(lines.filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str::<ChainEvent>(&line).map_err(anyhow::Error::from)),
        Err(err) => Some(Err(err.into())),
    }))
}

pub fn replay_file<C: ChainConsumer>(consumer: C, path: &Path) -> anyhow::Result<C> {
    replay(consumer, read_events(path)?)
}
