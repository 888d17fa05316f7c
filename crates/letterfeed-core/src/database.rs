//! `SQLite` connection URLs.

/// Builds the connection URL for a database location.
///
/// The location is either a file path or a `sqlite:` URL, so the scheme is
/// never doubled. `sqlite://feeds.db` is relative while `sqlite:///data/feeds.db`
/// and `sqlite:////data/feeds.db` both name `/data/feeds.db`. The database
/// file is created when missing unless the location sets its own `mode`.
#[must_use]
pub fn database_url(location: &str) -> String {
    let path = location
        .strip_prefix("sqlite://")
        .or_else(|| location.strip_prefix("sqlite:"))
        .unwrap_or(location);

    let (path, query) = path.split_once('?').unwrap_or((path, ""));
    let path = path
        .strip_prefix('/')
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or(path);
    if path == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    let has_mode = query.split('&').any(|param| param.starts_with("mode="));
    match (query.is_empty(), has_mode) {
        (true, _) => format!("sqlite:{path}?mode=rwc"),
        (false, true) => format!("sqlite:{path}?{query}"),
        (false, false) => format!("sqlite:{path}?{query}&mode=rwc"),
    }
}
