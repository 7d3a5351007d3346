pub const COIN: u64 = 100_000_000;
pub const HALVING_INTERVAL: u64 = 210_000;

/// Block subsidy in satoshis paid at `height`.
pub fn block_subsidy(height: u64) -> u64 {
    let halvings = height / HALVING_INTERVAL;
    if halvings >= 64 {
        return 0;
    }
    (50 * COIN) >> halvings
}
