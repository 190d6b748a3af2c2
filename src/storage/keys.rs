//! 逻辑 key 的类型化表示
//!
//! 逻辑 key 是加前缀之前、面向调用方的 key。已知的几类命名空间：
//!
//! | 变体 | 逻辑 key |
//! |------|----------|
//! | [`StorageKey::Conversation`] | `conversation:<id>` |
//! | [`StorageKey::ConversationSummary`] | `conversation-summary:<id>` |
//! | [`StorageKey::Theme`] | `theme` |
//! | [`StorageKey::Config`] | `config` |
//! | [`StorageKey::File`] | `file:<id>` |
//!
//! 注意 `conversation:` 并不是 `conversation-summary:` 的前缀，
//! 按 `conversation:` 过滤不会误选中摘要。

use std::fmt;

/// 带 id 的命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Conversation,
    ConversationSummary,
    File,
}

impl Namespace {
    /// 逻辑 key 的字面量前缀（含冒号）
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Conversation => "conversation:",
            Namespace::ConversationSummary => "conversation-summary:",
            Namespace::File => "file:",
        }
    }

    pub fn key(self, id: impl Into<String>) -> StorageKey {
        let id = id.into();
        match self {
            Namespace::Conversation => StorageKey::Conversation(id),
            Namespace::ConversationSummary => StorageKey::ConversationSummary(id),
            Namespace::File => StorageKey::File(id),
        }
    }

    /// 逻辑 key 属于该命名空间时返回其 id
    pub fn strip<'a>(self, logical: &'a str) -> Option<&'a str> {
        logical.strip_prefix(self.prefix())
    }
}

const THEME_KEY: &str = "theme";
const CONFIG_KEY: &str = "config";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Conversation(String),
    ConversationSummary(String),
    Theme,
    Config,
    File(String),
    /// 不属于任何已知命名空间的 key
    Custom(String),
}

impl StorageKey {
    /// 构造逻辑 key 字符串
    pub fn logical(&self) -> String {
        match self {
            StorageKey::Conversation(id) => format!("{}{}", Namespace::Conversation.prefix(), id),
            StorageKey::ConversationSummary(id) => {
                format!("{}{}", Namespace::ConversationSummary.prefix(), id)
            }
            StorageKey::Theme => THEME_KEY.to_string(),
            StorageKey::Config => CONFIG_KEY.to_string(),
            StorageKey::File(id) => format!("{}{}", Namespace::File.prefix(), id),
            StorageKey::Custom(key) => key.clone(),
        }
    }

    /// 从逻辑 key 还原类型化 key，无法识别的归为 [`StorageKey::Custom`]
    pub fn parse(logical: &str) -> Self {
        if let Some(id) = Namespace::ConversationSummary.strip(logical) {
            return StorageKey::ConversationSummary(id.to_string());
        }
        if let Some(id) = Namespace::Conversation.strip(logical) {
            return StorageKey::Conversation(id.to_string());
        }
        if let Some(id) = Namespace::File.strip(logical) {
            return StorageKey::File(id.to_string());
        }
        match logical {
            THEME_KEY => StorageKey::Theme,
            CONFIG_KEY => StorageKey::Config,
            other => StorageKey::Custom(other.to_string()),
        }
    }

    pub fn namespace(&self) -> Option<Namespace> {
        match self {
            StorageKey::Conversation(_) => Some(Namespace::Conversation),
            StorageKey::ConversationSummary(_) => Some(Namespace::ConversationSummary),
            StorageKey::File(_) => Some(Namespace::File),
            _ => None,
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.logical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_keys() {
        assert_eq!(StorageKey::Conversation("c1".into()).logical(), "conversation:c1");
        assert_eq!(
            StorageKey::ConversationSummary("c1".into()).logical(),
            "conversation-summary:c1"
        );
        assert_eq!(StorageKey::Theme.logical(), "theme");
        assert_eq!(StorageKey::Config.logical(), "config");
        assert_eq!(StorageKey::File("f9".into()).to_string(), "file:f9");
    }

    #[test]
    fn test_parse_known_and_custom() {
        assert_eq!(
            StorageKey::parse("conversation-summary:abc"),
            StorageKey::ConversationSummary("abc".into())
        );
        assert_eq!(
            StorageKey::parse("conversation:abc"),
            StorageKey::Conversation("abc".into())
        );
        assert_eq!(StorageKey::parse("theme"), StorageKey::Theme);
        assert_eq!(StorageKey::parse("file:"), StorageKey::File(String::new()));
        assert_eq!(
            StorageKey::parse("draft"),
            StorageKey::Custom("draft".into())
        );
    }

    #[test]
    fn test_conversation_prefix_excludes_summaries() {
        assert!(Namespace::Conversation.strip("conversation-summary:x").is_none());
        assert_eq!(Namespace::Conversation.key("x").namespace(), Some(Namespace::Conversation));
    }
}
