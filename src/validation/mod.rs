/*!
 * Source validation and fusion.
 *
 * - `overlap`: scores one script against subtitle dialogue
 * - `selection`: ranks candidate scripts and picks the best
 * - `fusion`: merges the best script's speakers onto subtitle text
 */

pub mod fusion;
pub mod overlap;
pub mod selection;

pub use fusion::{Fuser, FusionOutcome};
pub use overlap::{normalize_for_comparison, validate, OverlapValidator};
pub use selection::{rank_candidates, select_best, RankedCandidate, ScriptCandidate};
