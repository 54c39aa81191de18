//! Alias trie for text commands.
//!
//! Each registered root [`Action`] is compiled into a node, recursively
//! together with its subcommands. Every alias of an action maps to the same
//! node, so aliasing is many-to-one. Two actions declaring the same alias at
//! the same depth are rejected with [`AliasConflict`].
//!
//! Resolution is a greedy walk: tokens are consumed as long as the current
//! node has a child for the next one. The deepest action reached is returned
//! together with the tokens that were not consumed.
//!
//! ```text
//! config ─┬─ get
//! cfg  ───┘  set ── "theme dark"   (leftover arguments)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use switchyard_core::{AliasConflict, DispatchError, DispatchResult};
use tracing::debug;

use crate::action::Action;

#[derive(Debug)]
struct TrieNode {
    action: Arc<Action>,
    children: HashMap<String, Arc<TrieNode>>,
}

impl TrieNode {
    /// Compiles `action` and its whole subcommand tree.
    fn compile(action: &Arc<Action>) -> Result<Arc<Self>, AliasConflict> {
        let mut children = HashMap::new();
        for child in action.children() {
            let node = Self::compile(child)?;
            merge(&mut children, node)?;
        }
        Ok(Arc::new(Self {
            action: Arc::clone(action),
            children,
        }))
    }
}

/// Inserts `node` under each of its aliases, failing on the first collision.
fn merge(
    map: &mut HashMap<String, Arc<TrieNode>>,
    node: Arc<TrieNode>,
) -> Result<(), AliasConflict> {
    check_free(map, &node)?;
    for alias in node.action.aliases() {
        map.insert(alias.clone(), Arc::clone(&node));
    }
    Ok(())
}

fn check_free(map: &HashMap<String, Arc<TrieNode>>, node: &TrieNode) -> Result<(), AliasConflict> {
    for alias in node.action.aliases() {
        if let Some(existing) = map.get(alias) {
            return Err(AliasConflict {
                alias: alias.clone(),
                first: existing.action.name().to_string(),
                second: node.action.name().to_string(),
            });
        }
    }
    Ok(())
}

/// A resolved text command.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub action: Arc<Action>,
    /// Tokens that were not consumed by the walk.
    pub args: Vec<String>,
}

/// The compiled routing table for text commands.
#[derive(Debug, Default)]
pub struct AliasTrie {
    roots: HashMap<String, Arc<TrieNode>>,
}

impl AliasTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a set of root actions. Any conflict aborts the whole build.
    pub fn build<I>(actions: I) -> Result<Self, AliasConflict>
    where
        I: IntoIterator<Item = Arc<Action>>,
    {
        let mut trie = Self::new();
        for action in actions {
            trie.insert(action)?;
        }
        Ok(trie)
    }

    /// Adds one root action. On conflict the trie is left unchanged.
    pub fn insert(&mut self, action: Arc<Action>) -> Result<(), AliasConflict> {
        let node = TrieNode::compile(&action)?;
        merge(&mut self.roots, node)?;
        debug!(
            action = %action.name(),
            aliases = ?action.aliases(),
            "Registered text command"
        );
        Ok(())
    }

    /// Walks `tokens` as deep as possible.
    ///
    /// Returns `None` if not even the first token names a command.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Option<Resolution> {
        let (first, rest) = tokens.split_first()?;
        let mut node = self.roots.get(first.as_ref())?;
        let mut consumed = 1;
        for token in rest {
            match node.children.get(token.as_ref()) {
                Some(child) => {
                    node = child;
                    consumed += 1;
                }
                None => break,
            }
        }
        Some(Resolution {
            action: Arc::clone(&node.action),
            args: tokens[consumed..]
                .iter()
                .map(|t| t.as_ref().to_string())
                .collect(),
        })
    }

    /// Exact lookup: the action at `path`, only if every token matched.
    pub fn action_at<S: AsRef<str>>(&self, path: &[S]) -> Option<Arc<Action>> {
        self.node_at(path)
            .ok()
            .flatten()
            .map(|node| Arc::clone(&node.action))
    }

    /// Distinct listed actions directly under `path` (the roots when `path`
    /// is empty), sorted by name. Unlisted actions still resolve.
    ///
    /// An unknown path element fails with [`DispatchError::BadSubcommand`].
    pub fn list<S: AsRef<str>>(&self, path: &[S]) -> DispatchResult<Vec<Arc<Action>>> {
        let level = match self.node_at(path)? {
            Some(node) => &node.children,
            None => &self.roots,
        };
        let mut actions: Vec<Arc<Action>> = Vec::new();
        for node in level.values() {
            if node.action.is_unlisted() {
                continue;
            }
            if !actions.iter().any(|a| Arc::ptr_eq(a, &node.action)) {
                actions.push(Arc::clone(&node.action));
            }
        }
        actions.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(actions)
    }

    /// Number of distinct root actions.
    pub fn len(&self) -> usize {
        let mut seen: Vec<&Arc<Action>> = Vec::new();
        for node in self.roots.values() {
            if !seen.iter().any(|a| Arc::ptr_eq(a, &node.action)) {
                seen.push(&node.action);
            }
        }
        seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// `Ok(None)` for the empty path.
    fn node_at<S: AsRef<str>>(&self, path: &[S]) -> DispatchResult<Option<&Arc<TrieNode>>> {
        let mut level = &self.roots;
        let mut node = None;
        for token in path {
            let token = token.as_ref();
            let next = level
                .get(token)
                .ok_or_else(|| DispatchError::bad_subcommand(Some(token.to_string())))?;
            level = &next.children;
            node = Some(next);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::CommandDoc;

    fn leaf(name: &str) -> Action {
        Action::command(name).handler(|| async {}).build()
    }

    fn tokens(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_resolve_subcommand_with_leftover() {
        let root = Action::command("p").child(leaf("a")).build();
        let trie = AliasTrie::build([Arc::new(root)]).unwrap();

        let resolved = trie.resolve(&tokens("p a x")).unwrap();
        assert_eq!(resolved.action.name(), "a");
        assert_eq!(resolved.args, ["x"]);
    }

    #[test]
    fn test_resolve_stops_at_first_unknown_token() {
        let root = Action::command("p").child(leaf("a")).build();
        let trie = AliasTrie::build([Arc::new(root)]).unwrap();

        let resolved = trie.resolve(&tokens("p x a")).unwrap();
        assert_eq!(resolved.action.name(), "p");
        assert_eq!(resolved.args, ["x", "a"]);

        let bare = trie.resolve(&tokens("p")).unwrap();
        assert!(bare.args.is_empty());
    }

    #[test]
    fn test_resolve_no_command() {
        let trie = AliasTrie::build([Arc::new(leaf("p"))]).unwrap();
        assert!(trie.resolve(&tokens("q p")).is_none());
        assert!(trie.resolve::<String>(&[]).is_none());
    }

    #[test]
    fn test_resolution_is_case_sensitive() {
        let trie = AliasTrie::build([Arc::new(leaf("ping"))]).unwrap();
        assert!(trie.resolve(&tokens("PING")).is_none());
    }

    #[test]
    fn test_aliases_share_a_node() {
        let root = Action::command("config")
            .alias("cfg")
            .child(leaf("get"))
            .build();
        let trie = AliasTrie::build([Arc::new(root)]).unwrap();

        let a = trie.resolve(&tokens("config get")).unwrap();
        let b = trie.resolve(&tokens("cfg get")).unwrap();
        assert!(Arc::ptr_eq(&a.action, &b.action));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_sibling_conflict_is_fatal() {
        let root = Action::command("p")
            .child(Action::command("a").alias("x"))
            .child(Action::command("b").alias("x"))
            .build();
        let err = AliasTrie::build([Arc::new(root)]).unwrap_err();
        assert_eq!(
            err,
            AliasConflict {
                alias: "x".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
    }

    #[test]
    fn test_root_conflict_leaves_trie_unchanged() {
        let mut trie = AliasTrie::build([Arc::new(leaf("ping"))]).unwrap();
        let clash = Action::command("pong").alias("ping").build();
        assert!(trie.insert(Arc::new(clash)).is_err());
        assert!(trie.resolve(&tokens("pong")).is_none());
    }

    #[test]
    fn test_same_alias_at_different_depths_is_fine() {
        let root = Action::command("x").child(leaf("x")).build();
        let trie = AliasTrie::build([Arc::new(root)]).unwrap();
        let resolved = trie.resolve(&tokens("x x x")).unwrap();
        assert_eq!(resolved.args, ["x"]);
    }

    #[test]
    fn test_action_without_aliases_is_unreachable() {
        let trie = AliasTrie::build([Arc::new(Action::builder("hidden").build())]).unwrap();
        assert!(trie.is_empty());
        assert!(trie.resolve(&tokens("hidden")).is_none());
    }

    #[test]
    fn test_action_at_and_list() {
        let root = Action::command("config")
            .child(leaf("set"))
            .child(Action::command("get").alias("show"))
            .build();
        let trie = AliasTrie::build([Arc::new(root), Arc::new(leaf("ping"))]).unwrap();

        assert_eq!(trie.action_at(&["config", "show"]).unwrap().name(), "get");
        assert!(trie.action_at(&["config", "nope"]).is_none());

        let roots: Vec<_> = trie
            .list::<&str>(&[])
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(roots, ["config", "ping"]);

        let subs: Vec<_> = trie
            .list(&["config"])
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(subs, ["get", "set"]);

        match trie.list(&["config", "nope"]) {
            Err(DispatchError::BadSubcommand { token }) => {
                assert_eq!(token.as_deref(), Some("nope"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_list_skips_unlisted() {
        let hidden = Action::command("debug")
            .doc(CommandDoc::new("Dumps internal state.").unlisted())
            .handler(|| async {})
            .build();
        let shown = Action::command("help")
            .doc(CommandDoc::new("Lists commands."))
            .handler(|| async {})
            .build();
        let trie = AliasTrie::build([Arc::new(hidden), Arc::new(shown)]).unwrap();

        let roots: Vec<_> = trie
            .list::<&str>(&[])
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(roots, ["help"]);
        assert_eq!(trie.action_at(&["debug"]).unwrap().name(), "debug");
        assert_eq!(trie.resolve(&tokens("debug")).unwrap().action.name(), "debug");
        assert_eq!(trie.len(), 2);
    }
}
