//! 文本分割器
//!
//! 章节原文 → 可朗读片段：
//! 1. 去除标记（HTML 标签、实体）
//! 2. 按行、按标点切分（带最小字符数限制）
//! 3. 依据切分位置附加停顿提示

use crate::domain::playback::Segment;

/// 默认最小字符数限制
/// 当片段字符数未达到此限制时，弱分隔符不会触发分割
pub const DEFAULT_MIN_CHARS: usize = 20;

/// 文本分割配置
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 最小字符数限制（用于合并短句）
    pub min_chars: usize,
    /// 弱分隔符（逗号等）后的停顿
    pub clause_pause_ms: u32,
    /// 句末标点后的停顿
    pub sentence_pause_ms: u32,
    /// 段落（行）结束后的停顿
    pub paragraph_pause_ms: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            clause_pause_ms: 150,
            sentence_pause_ms: 350,
            paragraph_pause_ms: 700,
        }
    }
}

/// 检查是否为强分隔符（句末标点，总是分割）
#[inline]
fn is_strong_delimiter(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！' | '.' | '?' | '!')
}

/// 检查是否为弱分隔符（逗号等，达到最小字符数时才分割）
#[inline]
fn is_weak_delimiter(ch: char) -> bool {
    matches!(ch, '，' | '；' | '：' | ',' | ';' | ':')
}

/// 引号或空白
#[inline]
fn is_quote_or_space(ch: char) -> bool {
    // 中文引号: " (\u{201C}) " (\u{201D})  中文单引号: ' (\u{2018}) ' (\u{2019})
    matches!(ch, '"' | '\u{201C}' | '\u{201D}' | '\'' | '\u{2018}' | '\u{2019}' | ' ' | '\t')
}

/// 检查片段是否只包含引号或空白（应该被过滤或合并）
#[inline]
fn is_trivial_segment(s: &str) -> bool {
    s.chars().all(is_quote_or_space)
}

/// 按标点符号分割单行文本（带最小字符数限制，行内合并短句）
///
/// 分割策略：
/// 1. 按弱分隔符（需满足 min_chars）或强分隔符分割
/// 2. 合并短片段直到满足 min_chars
fn split_line(text: &str, config: &SegmentConfig) -> Vec<String> {
    // 第一步：按标点分割
    let raw_segments = split_by_delimiters(text, config);
    
    // 第二步：合并短片段
    merge_until_min_chars(raw_segments, config.min_chars)
}

/// 按分隔符分割（不做合并）
fn split_by_delimiters(text: &str, config: &SegmentConfig) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut char_count = 0;

    for ch in text.chars() {
        current.push(ch);
        char_count += 1;

        let should_split = if is_strong_delimiter(ch) {
            true // 强分隔符总是分割
        } else if is_weak_delimiter(ch) && char_count >= config.min_chars {
            true // 弱分隔符在满足 min_chars 时分割
        } else {
            false
        };

        if should_split {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                segments.push(trimmed);
            }
            current.clear();
            char_count = 0;
        }
    }

    // 剩余内容
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        segments.push(trimmed);
    }

    segments
}

/// 合并短片段直到满足 min_chars
fn merge_until_min_chars(segments: Vec<String>, min_chars: usize) -> Vec<String> {
    if segments.is_empty() {
        return segments;
    }

    let mut result: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for seg in segments {
        buffer.push_str(&seg);
        
        if buffer.chars().count() >= min_chars {
            result.push(std::mem::take(&mut buffer));
        }
    }

    // 处理剩余buffer
    if !buffer.is_empty() {
        if let Some(last) = result.last_mut() {
            // 合并到前一个
            last.push_str(&buffer);
        } else {
            // 没有前一个，单独保留
            result.push(buffer);
        }
    }

    result
}

/// 对文本进行分段
///
/// 分段策略：
/// 1. 按行分割（支持 \n 和 \r\n）
/// 2. 每行按标点符号分割（带最小字符数限制，行内合并短句）
/// 3. 过滤/合并只有引号的片段
///
/// 返回 `(片段, 是否为行尾)`
fn segment_text(text: &str, config: &SegmentConfig) -> Vec<(String, bool)> {
    let mut segments: Vec<(String, bool)> = Vec::new();

    let lines = text.lines().map(|s| s.trim()).filter(|s| !s.is_empty());

    for line in lines {
        let sentences = split_line(line, config);
        let count = sentences.len();
        for (i, sentence) in sentences.into_iter().enumerate() {
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                continue;
            }
            let line_end = i + 1 == count;

            // 如果是只有引号的片段，合并到前一个片段
            if is_trivial_segment(trimmed) {
                if let Some((last, last_line_end)) = segments.last_mut() {
                    last.push_str(trimmed);
                    *last_line_end |= line_end;
                }
            } else {
                segments.push((trimmed.to_string(), line_end));
            }
        }
    }

    segments
}

/// 根据片段结尾决定停顿时长
fn pause_hint(text: &str, line_end: bool, config: &SegmentConfig) -> u32 {
    if line_end {
        return config.paragraph_pause_ms;
    }
    // 跳过结尾的引号、括号
    let tail = text
        .chars()
        .rev()
        .find(|&c| !is_quote_or_space(c) && !matches!(c, ')' | '）' | '」' | '』'));
    match tail {
        Some(c) if is_strong_delimiter(c) => config.sentence_pause_ms,
        Some(c) if is_weak_delimiter(c) => config.clause_pause_ms,
        _ => 0,
    }
}

/// 解析章节原文为可朗读片段
///
/// 结果为空表示章节没有可朗读内容，由调用方决定如何处理
pub fn parse_segments(raw: &str, config: &SegmentConfig) -> Vec<Segment> {
    let plain = strip_markup(raw);
    segment_text(&plain, config)
        .into_iter()
        .map(|(text, line_end)| {
            let pause = pause_hint(&text, line_end, config);
            Segment::new(text, pause)
        })
        .collect()
}

/// 块级标签，移除时替换为换行
fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "br" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

/// 去除 HTML 标记
///
/// - `<script>`/`<style>` 连同内容一起移除
/// - 块级标签替换为换行，其余标签直接移除
/// - 解码常见实体
///
/// 不是合法标签开头的 `<`（如 `a < b`）原样保留
pub fn strip_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos..];

        let starts_tag = after[1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
            .unwrap_or(false);
        let end = match after.find('>') {
            Some(end) if starts_tag => end,
            _ => {
                out.push('<');
                rest = &after[1..];
                continue;
            }
        };

        let tag = &after[1..end];
        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        rest = &after[end + 1..];

        if !closing && (name == "script" || name == "style") {
            let close = format!("</{}", name);
            rest = match find_ignore_ascii_case(rest, &close) {
                Some(i) => match rest[i..].find('>') {
                    Some(j) => &rest[i + j + 1..],
                    None => "",
                },
                None => "",
            };
            continue;
        }

        if is_block_tag(&name) {
            out.push('\n');
        }
    }
    out.push_str(rest);

    decode_entities(&out)
}

/// 按 ASCII 忽略大小写查找；`needle` 为 ASCII，命中位置总在字符边界上
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// 解码 HTML 实体（命名实体与数字实体）
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos..];
        let decoded = after
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&after[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "nbsp" => Some(' '),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "hellip" => Some('…'),
        "mdash" => Some('—'),
        "ldquo" => Some('\u{201C}'),
        "rdquo" => Some('\u{201D}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
