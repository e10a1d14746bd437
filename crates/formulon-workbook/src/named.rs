//! Named expressions: a formula string bound to `(scope, name)` where
//! `scope` is a sheet name or the distinguished
//! `global`. Resolution tries the scope first, then falls back to global.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use formulon_parse::parser::ASTNode;

#[derive(Clone, Debug)]
pub(crate) enum NamedFormula {
    Parsed(Arc<ASTNode>),
    ParseError(String),
}

#[derive(Default)]
pub struct NamedExpressions {
    // Key is `None` for the global scope, `Some(sheet)` otherwise.
    entries: FxHashMap<(Option<String>, String), NamedFormula>,
}

impl NamedExpressions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, scope: Option<&str>, name: &str) -> bool {
        self.entries
            .contains_key(&(scope.map(str::to_string), name.to_string()))
    }

    pub fn insert(&mut self, scope: Option<String>, name: String, expression: &str) {
        let parsed = match formulon_parse::parser::parse(expression) {
            Ok(ast) => NamedFormula::Parsed(Arc::new(ast)),
            Err(e) => NamedFormula::ParseError(e.message),
        };
        self.entries.insert((scope, name), parsed);
    }

    pub fn remove(&mut self, scope: Option<&str>, name: &str) -> bool {
        self.entries
            .remove(&(scope.map(str::to_string), name.to_string()))
            .is_some()
    }

    /// Scope-first-then-global lookup, per spec.
    pub(crate) fn resolve(&self, scope: Option<&str>, name: &str) -> Option<(&NamedFormula, Option<String>)> {
        if let Some(sheet) = scope {
            if let Some(f) = self.entries.get(&(Some(sheet.to_string()), name.to_string())) {
                return Some((f, Some(sheet.to_string())));
            }
        }
        self.entries
            .get(&(None, name.to_string()))
            .map(|f| (f, None))
    }
}
