/// ─── IndexVest Constants ────────────────────────────────────────────────────
///
/// Fixed-point scales shared by the index converter, the vesting curve and
/// the percentage schedule.

// ── Fixed point ───────────────────────────────────────────────────────────────

/// 1.0 in 18-decimal fixed point. Both the index and the vested fraction
/// are expressed against this scale.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// The index every rebasing asset starts at.
pub const INITIAL_INDEX: u128 = SCALE;

// ── Percent shares ────────────────────────────────────────────────────────────

/// 100% in 4-decimal percent fixed point (10_000 = 1%).
pub const PERCENT_SCALE: u32 = 1_000_000;

/// One whole percent.
pub const ONE_PERCENT: u32 = 10_000;

// ── Storage keys ──────────────────────────────────────────────────────────────

/// Meta key binding a database to one schedule variant.
pub const META_LEDGER_KIND: &str = "ledger_kind";

/// Meta key holding the running percent allocation of the supply schedule.
pub const META_TOTAL_ALLOCATED: &str = "total_allocated";

/// Ledger kind tag for per-beneficiary fixed grants.
pub const LEDGER_KIND_FIXED: &str = "fixed";

/// Ledger kind tag for the percent-of-supply schedule.
pub const LEDGER_KIND_SUPPLY: &str = "supply";
