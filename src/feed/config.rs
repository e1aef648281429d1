pub struct Config {
    pub stops_path: String,
    pub lines_path: String,
    pub calls_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stops_path: "stops.txt".into(),
            lines_path: "lines.txt".into(),
            calls_path: "calls.txt".into(),
        }
    }
}
