// src/eval/predicate.rs

//! Declarative test predicates and their results.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use super::sandbox::Sandbox;
use crate::dom::{Document, SelectorList};
use crate::eval::text::normalize_whitespace;

/// One automated check against submitted code.
#[derive(Debug, Clone, Deserialize)]
pub struct TestPredicate {
    /// Unique within its task.
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub hint: Option<String>,
    pub check: Check,
}

impl TestPredicate {
    pub fn new(id: impl Into<String>, description: impl Into<String>, check: Check) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            hint: None,
            check,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// What a predicate checks. Tagged by `kind` in catalog files.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// Case-insensitive regex must match the code.
    Contains { pattern: String },
    /// Case-insensitive regex must not match the code.
    Absent { pattern: String },
    /// Words outside fenced code blocks.
    WordCount { min: usize },
    /// At least one closed fenced code block.
    FencedCode,
    /// Parse the submission itself as markup and inspect it.
    Markup { expect: Vec<ElementExpectation> },
    /// The script declares a function with this name.
    Defines { function: String },
    /// Run the code, then `assert`; passes iff the final value is `true`.
    /// With a template the run happens in DOM mode.
    Script {
        assert: String,
        #[serde(default)]
        template: Option<String>,
    },
    /// Run the code against the parsed template, then inspect the tree.
    Dom {
        template: String,
        expect: Vec<ElementExpectation>,
    },
    /// Run the code (then `call`, if any) and look for a console line.
    Logs {
        pattern: String,
        #[serde(default)]
        call: Option<String>,
    },
    /// Programmatic check; not available from catalog files.
    #[serde(skip)]
    Custom(CustomCheck),
}

impl Check {
    /// Compile every regex and selector the check carries.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Check::Contains { pattern } | Check::Absent { pattern } => {
                compile_pattern(pattern).map(drop)
            }
            Check::Logs { pattern, call } => {
                if call.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    return Err("`call` must not be empty".to_string());
                }
                compile_pattern(pattern).map(drop)
            }
            Check::Markup { expect } | Check::Dom { expect, .. } => {
                if expect.is_empty() {
                    return Err("`expect` must list at least one element".to_string());
                }
                expect.iter().try_for_each(ElementExpectation::validate)
            }
            Check::Defines { function } if function.trim().is_empty() => {
                Err("`function` must not be empty".to_string())
            }
            Check::Script { assert, .. } if assert.trim().is_empty() => {
                Err("`assert` must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Case-insensitive regex, the convention for keyword checks.
pub fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}

type CustomFn = dyn Fn(&str, &dyn Sandbox) -> anyhow::Result<bool> + Send + Sync;

/// A check written in Rust. Errors and panics fail the predicate.
#[derive(Clone)]
pub struct CustomCheck(Arc<CustomFn>);

impl CustomCheck {
    pub fn new(
        f: impl Fn(&str, &dyn Sandbox) -> anyhow::Result<bool> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, code: &str, sandbox: &dyn Sandbox) -> anyhow::Result<bool> {
        (self.0)(code, sandbox)
    }
}

impl fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomCheck(..)")
    }
}

fn default_min_count() -> usize {
    1
}

/// Requirement on the elements matching `selector`.
///
/// Satisfied when at least `min_count` matching elements meet every stated
/// property.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementExpectation {
    pub selector: String,
    #[serde(default = "default_min_count")]
    pub min_count: usize,
    /// Case-insensitive regex over the whitespace-normalized text.
    pub text_matches: Option<String>,
    /// Minimum length (in chars) of the trimmed text.
    pub min_text_len: Option<usize>,
    /// Attribute that must be present.
    pub attribute: Option<String>,
    /// Regex the value of `attribute` must match.
    pub attribute_matches: Option<String>,
    pub has_class: Option<String>,
    pub lacks_class: Option<String>,
}

impl ElementExpectation {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            min_count: 1,
            text_matches: None,
            min_text_len: None,
            attribute: None,
            attribute_matches: None,
            has_class: None,
            lacks_class: None,
        }
    }

    pub fn min_count(mut self, n: usize) -> Self {
        self.min_count = n;
        self
    }

    pub fn text_matches(mut self, pattern: impl Into<String>) -> Self {
        self.text_matches = Some(pattern.into());
        self
    }

    pub fn min_text_len(mut self, n: usize) -> Self {
        self.min_text_len = Some(n);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, matches: Option<&str>) -> Self {
        self.attribute = Some(name.into());
        self.attribute_matches = matches.map(str::to_string);
        self
    }

    pub fn has_class(mut self, class: impl Into<String>) -> Self {
        self.has_class = Some(class.into());
        self
    }

    pub fn lacks_class(mut self, class: impl Into<String>) -> Self {
        self.lacks_class = Some(class.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        SelectorList::parse(&self.selector).map_err(|e| e.to_string())?;
        if let Some(p) = &self.text_matches {
            compile_pattern(p)?;
        }
        if let Some(p) = &self.attribute_matches {
            if self.attribute.is_none() {
                return Err(format!(
                    "`attribute_matches` on '{}' needs `attribute`",
                    self.selector
                ));
            }
            compile_pattern(p)?;
        }
        Ok(())
    }

    /// Evaluate against `doc`. `Err` only for malformed expectations.
    pub fn check(&self, doc: &Document) -> Result<bool, String> {
        let selector = SelectorList::parse(&self.selector).map_err(|e| e.to_string())?;
        let text_re = self.text_matches.as_deref().map(compile_pattern).transpose()?;
        let attr_re = self
            .attribute_matches
            .as_deref()
            .map(compile_pattern)
            .transpose()?;

        let satisfied = doc
            .select_all(doc.root(), &selector)
            .into_iter()
            .filter(|&node| {
                let text = normalize_whitespace(&doc.text_content(node));
                if text_re.as_ref().is_some_and(|re| !re.is_match(&text)) {
                    return false;
                }
                if self.min_text_len.is_some_and(|n| text.chars().count() < n) {
                    return false;
                }
                if let Some(attr) = &self.attribute {
                    match doc.attribute(node, attr) {
                        None => return false,
                        Some(value) => {
                            if attr_re.as_ref().is_some_and(|re| !re.is_match(value)) {
                                return false;
                            }
                        }
                    }
                }
                if self.has_class.as_deref().is_some_and(|c| !doc.has_class(node, c)) {
                    return false;
                }
                if self.lacks_class.as_deref().is_some_and(|c| doc.has_class(node, c)) {
                    return false;
                }
                true
            })
            .count();

        Ok(satisfied >= self.min_count)
    }
}

/// Outcome of one predicate, in the task's declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateResult {
    pub predicate_id: String,
    pub description: String,
    pub hint: Option<String>,
    pub pass: bool,
    /// Message of an error raised while checking, if any.
    pub error: Option<String>,
}

impl PredicateResult {
    pub fn all_pass(results: &[PredicateResult]) -> bool {
        !results.is_empty() && results.iter().all(|r| r.pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            test: Vec<TestPredicate>,
        }

        let src = r#"
            [[test]]
            id = "fence"
            description = "has a code sample"
            check = { kind = "fenced_code" }

            [[test]]
            id = "heading"
            description = "has a heading"
            hint = "add an h1"
            check = { kind = "markup", expect = [{ selector = "h1", text_matches = "welcome" }] }

            [[test]]
            id = "words"
            description = "long enough"
            check = { kind = "word_count", min = 12 }
        "#;
        let w: Wrapper = toml::from_str(src).unwrap();
        assert_eq!(w.test.len(), 3);
        assert!(matches!(w.test[0].check, Check::FencedCode));
        match &w.test[1].check {
            Check::Markup { expect } => {
                assert_eq!(expect[0].min_count, 1);
                assert_eq!(expect[0].text_matches.as_deref(), Some("welcome"));
            }
            other => panic!("unexpected check {other:?}"),
        }
        assert!(matches!(w.test[2].check, Check::WordCount { min: 12 }));
    }

    #[test]
    fn validation_catches_bad_patterns_and_selectors() {
        assert!(Check::Contains { pattern: "(".into() }.validate().is_err());
        assert!(
            Check::Markup {
                expect: vec![ElementExpectation::selector("div >")]
            }
            .validate()
            .is_err()
        );
        let mut orphan = ElementExpectation::selector("a");
        orphan.attribute_matches = Some("https".into());
        assert!(orphan.validate().is_err());
    }

    #[test]
    fn expectation_counts_only_fully_satisfying_elements() {
        let doc = Document::parse(
            r#"<ul><li class="done">Buy milk</li><li>Walk</li><li class="done">x</li></ul>"#,
        );
        let exp = ElementExpectation::selector("li").has_class("done").min_text_len(3);
        assert_eq!(exp.check(&doc), Ok(true));
        assert_eq!(exp.clone().min_count(2).check(&doc), Ok(false));

        let links = Document::parse(r#"<a href="https://mdn.dev">MDN</a><a>none</a>"#);
        let exp = ElementExpectation::selector("a").attribute("href", Some("^https://"));
        assert_eq!(exp.check(&links), Ok(true));
        assert_eq!(exp.min_count(2).check(&links), Ok(false));
    }
}
