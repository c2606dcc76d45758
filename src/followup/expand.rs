//! Query expansion for follow-up retrieval.
//!
//! Two helper prompts widen the retrieval net: paraphrases keep the intent
//! and change the wording, related questions keep the topic and change the
//! angle. Expansion is best-effort; any failure leaves only the original
//! query.

use futures_util::join;
use tracing::{debug, warn};

use crate::constants::MAX_EXPANDED_QUERIES;
use crate::llm::json::{parse_json, string_array};
use crate::llm::ChatClient;

const SYNONYM_PROMPT: &str = "你是一个专业的语义分析助手。请为以下用户问题生成2-3个同义表达或相似问法。

要求：
1. 保持原意不变，只改变表达方式
2. 使用与原问题相同的语言
3. 每个表达应该简洁明了
4. 不要添加新的信息或改变问题范围

用户问题: {query}

请以JSON格式返回，格式如下：
{\"synonyms\": [\"同义表达1\", \"同义表达2\"]}

只返回JSON，不要其他解释。";

const RELATED_PROMPT: &str = "你是一个专业的问题分析助手。基于用户的问题，生成2个语义相关但角度不同的问题。

要求：
1. 生成的问题应该与原问题主题相关
2. 从不同角度或更具体的方面提问
3. 使用与原问题相同的语言
4. 问题应该以问号结尾

用户问题: {query}

请以JSON格式返回，格式如下：
{\"related\": [\"相关问题1？\", \"相关问题2？\"]}

只返回JSON，不要其他解释。";

async fn ask_for_list(chat: &ChatClient, template: &str, query: &str, key: &str, cap: usize) -> Vec<String> {
    let prompt = template.replace("{query}", query);
    let response = match chat.complete(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, key, "query expansion call failed");
            return Vec::new();
        }
    };

    match parse_json(&response) {
        Ok(value) => {
            let mut items = string_array(&value, key);
            items.truncate(cap);
            items
        }
        Err(e) => {
            warn!(error = %e, key, "query expansion returned unparseable output");
            Vec::new()
        }
    }
}

/// Merges the original query with expansions, deduplicating
/// case-insensitively and capping the total. The original always survives
/// and always comes first.
pub fn merge_queries(original: &str, synonyms: Vec<String>, related: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();

    for query in std::iter::once(original.to_string())
        .chain(synonyms)
        .chain(related)
    {
        let query = query.trim().to_string();
        if query.is_empty() {
            continue;
        }
        if seen.insert(query.to_lowercase()) {
            merged.push(query);
        }
        if merged.len() == MAX_EXPANDED_QUERIES {
            break;
        }
    }
    merged
}

/// Expands a query into up to five retrieval queries (original included).
pub async fn expand_query(chat: &ChatClient, query: &str, enabled: bool) -> Vec<String> {
    if !enabled {
        return vec![query.to_string()];
    }

    let (synonyms, related) = join!(
        ask_for_list(chat, SYNONYM_PROMPT, query, "synonyms", 3),
        ask_for_list(chat, RELATED_PROMPT, query, "related", 2),
    );

    let merged = merge_queries(query, synonyms, related);
    debug!(expanded = merged.len(), "query expansion complete");
    merged
}
