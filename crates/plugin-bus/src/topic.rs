//! Subject parsing and pattern matching.
//!
//! Inbound subjects look like `<prefix>.bin.<tenantId>.<pluginId>.<path>`,
//! e.g. `soren.v2.bin.S1.jira.issues.create`.

/// Segment that precedes the tenant identifier.
pub const TENANT_MARKER: &str = "bin";

/// Tenant identifier of `topic`: the segment right after the first `bin`.
///
/// Returns `""` when the marker is absent or is the last segment.
pub fn extract_tenant(topic: &str) -> &str {
    let mut segments = topic.split('.');
    while let Some(segment) = segments.next() {
        if segment == TENANT_MARKER {
            return segments.next().unwrap_or("");
        }
    }
    ""
}

/// Action path of `topic` for `plugin_id`: everything after
/// `bin.<tenant>.<plugin_id>.`.
///
/// `soren.v2.bin.S1.jira.issues.create` with plugin `jira` gives `issues.create`.
pub fn action_path<'a>(topic: &'a str, plugin_id: &str) -> Option<&'a str> {
    let mut offset = 0;
    let mut segments = topic.split('.');

    // Walk to the marker, tracking byte offsets.
    loop {
        let segment = segments.next()?;
        offset += segment.len() + 1;
        if segment == TENANT_MARKER {
            break;
        }
    }

    let tenant = segments.next()?;
    offset += tenant.len() + 1;

    let plugin = segments.next()?;
    if plugin != plugin_id {
        return None;
    }
    offset += plugin.len() + 1;

    let path = topic.get(offset..)?;
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Subscription pattern covering every action of `plugin_id` under `prefix`.
pub fn inbound_pattern(prefix: &str, plugin_id: &str) -> String {
    format!("{prefix}.{TENANT_MARKER}.*.{plugin_id}.>")
}

/// Whether `subject` matches `pattern`.
///
/// `*` matches exactly one segment; `>` as the final segment matches one or
/// more remaining segments.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_segments = pattern.split('.').peekable();
    let mut subject_segments = subject.split('.');

    while let Some(expected) = pattern_segments.next() {
        if expected == ">" && pattern_segments.peek().is_none() {
            return subject_segments.next().is_some();
        }
        match subject_segments.next() {
            Some(actual) if expected == "*" || expected == actual => {}
            _ => return false,
        }
    }

    subject_segments.next().is_none()
}

/// Whether `pattern` contains wildcards.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.split('.').any(|segment| segment == "*" || segment == ">")
}
