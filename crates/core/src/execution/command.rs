//! Command line construction.
//!
//! Every item of a spec's `command` list is rendered independently, split
//! into shell words, and the words of all items are joined back into one
//! POSIX-quoted line. A substituted value can therefore never introduce
//! unquoted shell syntax.

use std::collections::HashMap;

use super::params::ParamResolver;
use super::session::JobSession;
use crate::error::{RunError, SpecError};
use crate::template;

/// Environment entries available to every template besides the parameters.
fn base_env(session: &JobSession) -> HashMap<String, String> {
    HashMap::from([
        ("cwd".to_string(), session.path().to_string_lossy().into_owned()),
        (
            "cwd_abs".to_string(),
            session.absolute_path().to_string_lossy().into_owned(),
        ),
    ])
}

/// Render a spec's command items into a single shell-safe command line.
pub async fn build_command_line(
    items: &[String],
    session: &JobSession,
    resolver: &mut ParamResolver<'_>,
) -> Result<String, RunError> {
    let env = base_env(session);
    let mut words: Vec<String> = Vec::new();

    for item in items {
        let rendered = render_item(item, &env, resolver).await?;
        words.extend(split_words(&rendered)?);
    }

    shlex::try_join(words.iter().map(String::as_str))
        .map_err(|_| RunError::InvalidCommand(SpecError::NulByte))
}

/// Split `input` into words with POSIX shell quoting rules.
///
/// Unlike `shlex::split`, a word starting with `#` is an ordinary word, not
/// a comment. Inside double quotes a backslash only escapes `"` and `\\`.
pub(crate) fn split_words(input: &str) -> Result<Vec<String>, SpecError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Normal,
        SingleQuoted,
        DoubleQuoted,
    }

    let unbalanced = || SpecError::UnbalancedQuoting(input.to_string());
    let mut words = Vec::new();
    let mut current = String::new();
    // Tracks words made only of empty quotes, such as `''`.
    let mut in_word = false;
    let mut mode = Mode::Normal;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match mode {
            Mode::Normal => match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    mode = Mode::SingleQuoted;
                    in_word = true;
                }
                '"' => {
                    mode = Mode::DoubleQuoted;
                    in_word = true;
                }
                '\\' => {
                    current.push(chars.next().ok_or_else(unbalanced)?);
                    in_word = true;
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            Mode::SingleQuoted => match ch {
                '\'' => mode = Mode::Normal,
                c => current.push(c),
            },
            Mode::DoubleQuoted => match ch {
                '"' => mode = Mode::Normal,
                '\\' => match chars.next().ok_or_else(unbalanced)? {
                    c @ ('"' | '\\') => current.push(c),
                    c => {
                        current.push('\\');
                        current.push(c);
                    }
                },
                c => current.push(c),
            },
        }
    }

    if mode != Mode::Normal {
        return Err(unbalanced());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Substitute one item; items without placeholders are returned verbatim.
async fn render_item(
    item: &str,
    base_env: &HashMap<String, String>,
    resolver: &mut ParamResolver<'_>,
) -> Result<String, RunError> {
    let identifiers = template::extract_identifiers(item);
    if identifiers.is_empty() {
        return Ok(item.to_string());
    }

    // Parameter values take precedence over the built-in entries.
    let mut env = base_env.clone();
    env.extend(resolver.resolve(&identifiers).await?);
    Ok(template::substitute(item, &env))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::execution::params::{ParamMap, ParamValue};
    use crate::spec::{ParamSpec, ParamType};

    fn items(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn build(list: &[&str], values: &[(&str, &str)]) -> Result<String, RunError> {
        let base = tempfile::tempdir().expect("create temp dir");
        let session = JobSession::open(base.path()).await.expect("open");
        let params = BTreeMap::new();
        let values: ParamMap = values
            .iter()
            .map(|(k, v)| (k.to_string(), ParamValue::from(*v)))
            .collect();
        let mut resolver = ParamResolver::new(&params, session.path(), &values);
        build_command_line(&items(list), &session, &mut resolver).await
    }

    #[tokio::test]
    async fn plain_items_pass_through() {
        let line = build(&["ls", "-la"], &[]).await.expect("build");
        assert_eq!(line, "ls -la");
    }

    #[tokio::test]
    async fn substitutes_parameters() {
        let line = build(&["echo", "$greeting"], &[("greeting", "hi")])
            .await
            .expect("build");
        assert_eq!(line, "echo hi");
    }

    #[tokio::test]
    async fn value_with_spaces_is_split_into_words() {
        let line = build(&["echo", "$args"], &[("args", "one two")])
            .await
            .expect("build");
        assert_eq!(split_words(&line).expect("split"), vec!["echo", "one", "two"]);
    }

    #[tokio::test]
    async fn quoted_template_keeps_value_whole() {
        let line = build(&["echo", "'$msg'"], &[("msg", "hello world")])
            .await
            .expect("build");
        assert_eq!(split_words(&line).expect("split"), vec!["echo", "hello world"]);
    }

    #[tokio::test]
    async fn shell_metacharacters_are_quoted() {
        let line = build(&["echo", "$msg"], &[("msg", "a;rm -rf x|y&&$(z)")])
            .await
            .expect("build");
        let words = split_words(&line).expect("split");
        assert_eq!(words, vec!["echo", "a;rm", "-rf", "x|y&&$(z)"]);
        assert!(!line.contains(" a;rm"), "metacharacters must be quoted: {line}");
    }

    #[tokio::test]
    async fn unresolved_placeholder_is_left_in_place() {
        let line = build(&["echo", "${missing}"], &[]).await.expect("build");
        assert_eq!(split_words(&line).expect("split"), vec!["echo", "${missing}"]);
    }

    #[tokio::test]
    async fn unbalanced_quote_is_invalid_command() {
        let result = build(&["echo", "$msg"], &[("msg", "it's")]).await;
        assert_matches!(
            result,
            Err(RunError::InvalidCommand(SpecError::UnbalancedQuoting(_)))
        );
    }

    #[tokio::test]
    async fn cwd_entries_point_at_job_directory() {
        let base = tempfile::tempdir().expect("create temp dir");
        let session = JobSession::open(base.path()).await.expect("open");
        let params = BTreeMap::new();
        let values = ParamMap::new();
        let mut resolver = ParamResolver::new(&params, session.path(), &values);

        let line = build_command_line(&items(&["ls", "$cwd_abs"]), &session, &mut resolver)
            .await
            .expect("build");
        let words = split_words(&line).expect("split");
        assert_eq!(words[1], session.absolute_path().to_string_lossy());
    }

    #[tokio::test]
    async fn file_param_renders_as_filename() {
        let base = tempfile::tempdir().expect("create temp dir");
        let session = JobSession::open(base.path()).await.expect("open");
        let params = BTreeMap::from([(
            "doc".to_string(),
            ParamSpec {
                required: true,
                kind: ParamType::File,
                filename: Some("input.txt".to_string()),
            },
        )]);
        let values = ParamMap::from([("doc".to_string(), ParamValue::Bytes(b"data".to_vec()))]);
        let mut resolver = ParamResolver::new(&params, session.path(), &values);

        let line = build_command_line(&items(&["cat", "$doc"]), &session, &mut resolver)
            .await
            .expect("build");
        assert_eq!(split_words(&line).expect("split"), vec!["cat", "input.txt"]);
        assert!(session.path().join("input.txt").exists());
    }

    #[tokio::test]
    async fn hash_is_not_a_comment() {
        let line = build(&["echo", "$msg"], &[("msg", "#ff0000 red")])
            .await
            .expect("build");
        assert_eq!(split_words(&line).expect("split"), vec!["echo", "#ff0000", "red"]);

        let line = build(&["echo", "#1"], &[]).await.expect("build");
        assert_eq!(split_words(&line).expect("split"), vec!["echo", "#1"]);
    }

    #[tokio::test]
    async fn double_dollar_collapses_only_in_templated_items() {
        let line = build(&["echo", "$$ $x"], &[("x", "hi")])
            .await
            .expect("build");
        assert_eq!(line, "echo '$' hi");

        let line = build(&["echo", "$$"], &[]).await.expect("build");
        assert_eq!(line, "echo '$$'");
    }

    #[test]
    fn split_words_follows_shell_quoting() {
        let words = split_words(r#"a 'b c' "d \"e\" \$f" g\ h '' #i"#).expect("split");
        assert_eq!(words, vec!["a", "b c", r#"d "e" \$f"#, "g h", "", "#i"]);
    }

    #[test]
    fn split_words_rejects_unterminated_input() {
        assert_matches!(split_words("'open"), Err(SpecError::UnbalancedQuoting(_)));
        assert_matches!(split_words("\"open"), Err(SpecError::UnbalancedQuoting(_)));
        assert_matches!(split_words("trailing\\"), Err(SpecError::UnbalancedQuoting(_)));
    }
}
