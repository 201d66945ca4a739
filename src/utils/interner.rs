//! Global String Interner
//!
//! Turns define names and values into integer [`Symbol`]s so define sets can
//! be compared and hashed without touching string data.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Compact integer identifier of an interned string.
pub type Symbol = Spur;

/// Interns a string, returning the existing symbol when already present.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up the symbol of an already interned string without allocating.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a symbol back to its string.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Pre-interns the define names the pipeline itself always emits.
pub fn preload_pipeline_defines() {
    let common = [
        "CAMERA_NEAR",
        "CAMERA_FAR",
        "CONST_ARRAY",
        "REFERENCE_MODE",
        "USE_R11G11B10",
        "LC_TILE_SLICES",
        "LC_MAX_DISTANCE",
        "LC_SLICE_WIDTH",
        "LC_MAX_LIGHTS_PER_CELL",
        "SHADOW_ATLAS_SIZE",
        "SHADOW_MAX_UPDATES",
        "SHADOW_MAX_UPDATE_DISTANCE",
        "0",
        "1",
    ];

    for name in common {
        intern(name);
    }
}
