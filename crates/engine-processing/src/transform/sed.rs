use async_trait::async_trait;
use bytes::Bytes;
use regex::bytes::{Regex, RegexBuilder};

use crate::error::TransformError;
use crate::transform::{StageInput, StageOutput, StageStats, Transform};

/// Line-oriented stream editor restricted to substitution commands.
///
/// A script is one or more `s<delim>pattern<delim>replacement<delim>flags`
/// commands separated by `;` or newlines, applied to every line in order.
/// Patterns use the `regex` crate's syntax; the replacement understands
/// sed's `&` and `\1`..`\9` group references. Supported flags are `g`
/// (replace every match on the line) and `i` (case-insensitive).
#[derive(Debug)]
pub struct Sed {
    commands: Vec<SedCommand>,
}

#[derive(Debug)]
struct SedCommand {
    regex: Regex,
    replacement: Vec<u8>,
    global: bool,
}

impl Sed {
    pub fn new(script: &str) -> Result<Self, TransformError> {
        let mut commands = Vec::new();
        for raw in script.split(|c| c == ';' || c == '\n') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            commands.push(parse_command(raw)?);
        }
        if commands.is_empty() {
            return Err(TransformError::InvalidConfig(
                "sed script contains no commands".to_string(),
            ));
        }
        Ok(Self { commands })
    }

    fn edit_line(&self, line: &[u8]) -> Vec<u8> {
        let mut current = line.to_vec();
        for command in &self.commands {
            let edited = if command.global {
                command.regex.replace_all(&current, command.replacement.as_slice())
            } else {
                command.regex.replace(&current, command.replacement.as_slice())
            };
            current = edited.into_owned();
        }
        current
    }
}

fn parse_command(raw: &str) -> Result<SedCommand, TransformError> {
    let mut chars = raw.chars();
    if chars.next() != Some('s') {
        return Err(TransformError::InvalidConfig(format!(
            "unsupported sed command {raw:?}, only substitution is supported"
        )));
    }
    let delim = chars.next().ok_or_else(|| {
        TransformError::InvalidConfig(format!("incomplete sed command {raw:?}"))
    })?;

    // Split on the delimiter, honoring backslash escapes of it.
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in chars {
        if escaped {
            if c != delim {
                current.push('\\');
            }
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == delim {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    if parts.len() != 2 {
        return Err(TransformError::InvalidConfig(format!(
            "sed substitution {raw:?} must have the form s{delim}pattern{delim}replacement{delim}flags"
        )));
    }
    let flags = current;

    let mut global = false;
    let mut case_insensitive = false;
    for flag in flags.chars() {
        match flag {
            'g' => global = true,
            'i' => case_insensitive = true,
            other => {
                return Err(TransformError::InvalidConfig(format!(
                    "unsupported sed flag {other:?} in {raw:?}"
                )));
            }
        }
    }

    let regex = RegexBuilder::new(&parts[0])
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| TransformError::InvalidConfig(format!("bad sed pattern: {e}")))?;

    Ok(SedCommand {
        regex,
        replacement: convert_replacement(&parts[1]),
        global,
    })
}

/// Rewrites sed replacement syntax into the `regex` crate's: `&` and `\N`
/// become `${0}` and `${N}`, their escaped forms become literals, and `$`
/// is neutralized so input dollars stay literal.
fn convert_replacement(sed_repl: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(sed_repl.len());
    let mut chars = sed_repl.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.extend_from_slice(b"${0}"),
            '$' => out.extend_from_slice(b"$$"),
            '\\' => match chars.next() {
                Some('&') => out.push(b'&'),
                Some('\\') => out.push(b'\\'),
                Some(d @ '0'..='9') => {
                    out.extend_from_slice(b"${");
                    out.push(d as u8);
                    out.push(b'}');
                }
                Some(other) => {
                    let mut buf = [0u8; 4];
                    out.push(b'\\');
                    out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
                }
                None => out.push(b'\\'),
            },
            other => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out
}

#[async_trait]
impl Transform for Sed {
    fn name(&self) -> &'static str {
        "sed"
    }

    async fn apply(
        &self,
        input: &mut StageInput,
        output: &mut StageOutput,
    ) -> Result<StageStats, TransformError> {
        let mut stats = StageStats::default();
        // Holds at most one partial line between chunks.
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = input.next_chunk().await? {
            stats.bytes_in += chunk.len() as u64;

            let mut start = 0;
            while let Some(pos) = chunk[start..].iter().position(|&b| b == b'\n') {
                pending.extend_from_slice(&chunk[start..start + pos]);
                start += pos + 1;

                let mut edited = self.edit_line(&pending);
                pending.clear();
                edited.push(b'\n');
                stats.bytes_out += edited.len() as u64;
                output.put_chunk(Bytes::from(edited)).await?;
            }
            pending.extend_from_slice(&chunk[start..]);
        }

        // Trailing line without a newline is still edited, and stays
        // without one.
        if !pending.is_empty() {
            let edited = self.edit_line(&pending);
            stats.bytes_out += edited.len() as u64;
            output.put_chunk(Bytes::from(edited)).await?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::testutil::apply_to_bytes;

    async fn run(script: &str, input: &[u8]) -> Vec<u8> {
        let sed = Sed::new(script).unwrap();
        apply_to_bytes(&sed, input).await.unwrap().0
    }

    #[tokio::test]
    async fn substitutes_first_match_per_line() {
        let out = run("s/cat/dog/", b"cat sat on a cat\nno cats here\n").await;
        assert_eq!(out, b"dog sat on a cat\nno dogs here\n");
    }

    #[tokio::test]
    async fn global_flag_replaces_all_matches() {
        let out = run("s/cat/dog/g", b"cat cat cat\n").await;
        assert_eq!(out, b"dog dog dog\n");
    }

    #[tokio::test]
    async fn case_insensitive_flag() {
        let out = run("s/warn/note/ig", b"WARN: Warn: warn\n").await;
        assert_eq!(out, b"note: note: note\n");
    }

    #[tokio::test]
    async fn ampersand_and_group_references() {
        let out = run("s/[0-9]+/<&>/", b"order 1234 shipped\n").await;
        assert_eq!(out, b"order <1234> shipped\n");

        let out = run(r"s/(\w+)=(\w+)/\2=\1/", b"key=value\n").await;
        assert_eq!(out, b"value=key\n");
    }

    #[tokio::test]
    async fn escaped_ampersand_is_literal() {
        let out = run(r"s/and/\&/", b"you and me\n").await;
        assert_eq!(out, b"you & me\n");
    }

    #[tokio::test]
    async fn multiple_commands_apply_in_order() {
        let out = run("s/a/b/g; s/b/c/g", b"aba\n").await;
        assert_eq!(out, b"ccc\n");
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_edited_whole() {
        // apply_to_bytes feeds 7-byte chunks, so this line straddles
        // several of them.
        let input = b"prefix prefix prefix target suffix\n";
        let out = run("s/target/hit/", input).await;
        assert_eq!(out, b"prefix prefix prefix hit suffix\n");
    }

    #[tokio::test]
    async fn trailing_line_without_newline() {
        let out = run("s/end/END/", b"first\nlast end").await;
        assert_eq!(out, b"first\nlast END");
    }

    #[tokio::test]
    async fn alternate_delimiter() {
        let out = run("s|/usr/local|/opt|", b"path=/usr/local/bin\n").await;
        assert_eq!(out, b"path=/opt/bin\n");
    }

    #[tokio::test]
    async fn dollar_in_replacement_stays_literal() {
        let out = run("s/price/$10/", b"price due\n").await;
        assert_eq!(out, b"$10 due\n");
    }

    #[tokio::test]
    async fn invalid_scripts_are_rejected() {
        assert!(matches!(Sed::new(""), Err(TransformError::InvalidConfig(_))));
        assert!(matches!(Sed::new("y/a/b/"), Err(TransformError::InvalidConfig(_))));
        assert!(matches!(Sed::new("s/a/b/x"), Err(TransformError::InvalidConfig(_))));
        assert!(matches!(Sed::new("s/a/b"), Err(TransformError::InvalidConfig(_))));
        assert!(matches!(Sed::new("s/[unclosed/b/"), Err(TransformError::InvalidConfig(_))));
    }
}
