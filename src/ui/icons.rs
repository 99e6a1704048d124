pub struct Icons;

impl Icons {
    pub const TRACTOR: &str = "🚜";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const KEY: &str = "🔑";
    pub const DATABASE: &str = "🗄️";
    pub const SEARCH: &str = "🔍";
}
