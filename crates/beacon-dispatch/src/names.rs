//! Wire event name normalization.

/// Convert an upper-snake wire event name to lower camel case.
///
/// `READY` → `ready`, `GUILD_MEMBER_ADD` → `guildMemberAdd`. Empty segments
/// (leading, trailing or doubled underscores) are dropped, so every input
/// maps to an underscore-free name.
pub fn normalize_event_name(wire: &str) -> String {
    let mut out = String::with_capacity(wire.len());
    for (i, segment) in wire.split('_').filter(|s| !s.is_empty()).enumerate() {
        let mut chars = segment.chars();
        if i > 0 {
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
            }
        }
        for c in chars {
            out.extend(c.to_lowercase());
        }
    }
    out
}
