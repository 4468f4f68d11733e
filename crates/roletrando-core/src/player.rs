use serde::{Deserialize, Serialize};

use crate::game_trait::PlayerId;

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 32;

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

/// A player as seen by every client of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub is_bot: bool,
    pub score: u64,
    /// False while the player is inside the reconnect grace period.
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            avatar: avatar_url(&name),
            name,
            is_bot: false,
            score: 0,
            connected: true,
        }
    }

    pub fn bot(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, name)
        }
    }
}

/// Trim and validate a display name. Returns `None` if it is unusable.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return None;
    }
    if name.chars().any(char::is_control) {
        return None;
    }
    Some(name.to_string())
}

/// Avatar image URL seeded by the player's name.
pub fn avatar_url(name: &str) -> String {
    format!("{AVATAR_BASE_URL}{}", percent_encode(name))
}

/// Percent-encode everything outside the RFC 3986 unreserved set, so a name
/// can go into a URL path segment or query value.
pub fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() * 3);
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_whitespace() {
        assert_eq!(sanitize_name("  Ana  ").as_deref(), Some("Ana"));
    }

    #[test]
    fn sanitize_rejects_empty_and_control_chars() {
        assert_eq!(sanitize_name("   "), None);
        assert_eq!(sanitize_name("Ana\u{7}"), None);
    }

    #[test]
    fn sanitize_rejects_long_names() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(sanitize_name(&long), None);
        let max = "x".repeat(MAX_NAME_LEN);
        assert!(sanitize_name(&max).is_some());
    }

    #[test]
    fn avatar_url_percent_encodes_name() {
        assert_eq!(
            avatar_url("Ana Maria"),
            "https://api.dicebear.com/7.x/avataaars/svg?seed=Ana%20Maria"
        );
        assert!(avatar_url("João").ends_with("Jo%C3%A3o"));
    }

    #[test]
    fn bot_constructor_sets_flag() {
        let bot = Player::bot(7, "Bot 1");
        assert!(bot.is_bot);
        assert!(bot.connected);
        assert_eq!(bot.score, 0);
    }
}
