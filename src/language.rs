//! Request language handling and localized strings.
//!
//! The service answers in one of three languages; anything else coerces to
//! Chinese, matching the behavior of the admin frontend.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Supported answer languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// Chinese (the default).
    #[default]
    Zh,
    /// English.
    En,
    /// Japanese.
    Ja,
}

impl Language {
    /// Parses a language tag, coercing anything unrecognized to [`Language::Zh`].
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Language::En,
            "ja" => Language::Ja,
            _ => Language::Zh,
        }
    }

    /// The wire tag for this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
            Language::Ja => "ja",
        }
    }

    /// System prompt for grounded generation, with `{context}` substituted in.
    pub fn system_prompt(&self, context: &str) -> String {
        let template = match self {
            Language::Zh => {
                "你是一个专业的知识库助手。请根据以下提供的上下文回答用户的问题。\
                 如果上下文中没有相关信息，请诚实地说你不知道。请使用中文回复。\n\n上下文:\n"
            }
            Language::En => {
                "You are a professional knowledge base assistant. Please answer the user's \
                 question based on the context provided below. If there is no relevant \
                 information in the context, please honestly say you don't know. \
                 Please respond in English.\n\nContext:\n"
            }
            Language::Ja => {
                "あなたはプロフェッショナルなナレッジベースアシスタントです。\
                 以下に提供されたコンテキストに基づいてユーザーの質問に答えてください。\
                 コンテキストに関連情報がない場合は、正直にわからないと言ってください。\
                 日本語で回答してください。\n\nコンテキスト:\n"
            }
        };
        format!("{template}{context}")
    }

    /// Reply used when retrieval produced no usable context.
    pub fn no_information_reply(&self) -> &'static str {
        match self {
            Language::Zh => "抱歉，我在知识库中没有找到与您的问题相关的信息。",
            Language::En => {
                "Sorry, I couldn't find any relevant information in the knowledge base \
                 related to your question."
            }
            Language::Ja => {
                "申し訳ありませんが、ナレッジベースにご質問に関連する情報が見つかりませんでした。"
            }
        }
    }

    /// Reply used when the request failed outright.
    pub fn request_failed_reply(&self) -> &'static str {
        match self {
            Language::Zh => "抱歉，处理您的请求时出现了问题，请稍后重试。",
            Language::En => "Sorry, something went wrong while processing your request. Please try again later.",
            Language::Ja => "申し訳ありませんが、リクエストの処理中に問題が発生しました。後でもう一度お試しください。",
        }
    }

    /// Hard-coded onboarding questions used when generation cannot produce
    /// enough answerable ones.
    pub fn default_questions(&self) -> [&'static str; 3] {
        match self {
            Language::Zh => [
                "这个知识库包含哪些内容？",
                "如何开始使用这个系统？",
                "有哪些主要功能？",
            ],
            Language::En => [
                "What does this knowledge base cover?",
                "How do I get started?",
                "What are the main features?",
            ],
            Language::Ja => [
                "このナレッジベースには何が含まれていますか？",
                "使い始めるにはどうすればいいですか？",
                "主な機能は何ですか？",
            ],
        }
    }

    /// Generic seed words used to sample representative chunks.
    pub fn seed_words(&self) -> [&'static str; 3] {
        match self {
            Language::Zh => ["介绍", "功能", "使用"],
            Language::En => ["overview", "features", "usage"],
            Language::Ja => ["紹介", "機能", "使い方"],
        }
    }

    /// Returns `true` if `text` ends with a question mark in any supported
    /// script.
    pub fn is_question(text: &str) -> bool {
        text.ends_with('?') || text.ends_with('？')
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Language::parse(&tag))
    }
}
