/// Markers printed in front of CLI messages
pub struct Icons;

impl Icons {
    pub const START: &str = "🚀";
    pub const SEARCH: &str = "🔍";
    pub const OK: &str = "✅";
    pub const FAIL: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const DOCUMENT: &str = "📄";
    pub const COMMIT: &str = "💾";
    pub const ROLLBACK: &str = "↩️";
    pub const REINDEX: &str = "🔧";
}
