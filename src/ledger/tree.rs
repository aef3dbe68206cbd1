//! Chart of accounts as an id-indexed forest
//!
//! Stored accounts only carry a `parent_id`, and that data may be damaged
//! (orphans, cycles). The forest is an arena: nodes live in one `Vec`, edges are
//! index lists, and every traversal uses an explicit stack plus a visited set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Account;

/// Account paired with its depth in a pre-order walk, for indented pickers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub account: Account,
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AccountTree {
    accounts: Vec<Account>,
    index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl AccountTree {
    /// Group accounts by parent in O(n).
    ///
    /// An account whose parent is not in the input becomes a root. Accounts that
    /// sit on a parent cycle are promoted to roots so that every input account is
    /// reachable exactly once.
    pub fn build(accounts: Vec<Account>) -> Self {
        let mut index = HashMap::with_capacity(accounts.len());
        for (i, account) in accounts.iter().enumerate() {
            index.entry(account.id.clone()).or_insert(i);
        }
        // Duplicate ids keep their first occurrence only.
        let accounts: Vec<Account> = accounts
            .into_iter()
            .enumerate()
            .filter(|(i, a)| index.get(&a.id) == Some(i))
            .map(|(_, a)| a)
            .collect();
        let index: HashMap<String, usize> = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();

        let mut children = vec![Vec::new(); accounts.len()];
        let mut parent = vec![None; accounts.len()];
        let mut roots = Vec::new();

        for (i, account) in accounts.iter().enumerate() {
            match account.parent_id.as_ref().and_then(|p| index.get(p)) {
                Some(&p) if p != i => {
                    children[p].push(i);
                    parent[i] = Some(p);
                }
                _ => roots.push(i),
            }
        }

        let mut tree = Self {
            accounts,
            index,
            children,
            roots,
        };
        tree.sort_by_code();

        let mut visited = tree.reachable();
        for i in 0..tree.accounts.len() {
            if visited[i] {
                continue;
            }
            if let Some(p) = parent[i].take() {
                tree.children[p].retain(|&c| c != i);
            }
            tree.roots.push(i);
            tree.mark_subtree(i, &mut visited);
        }
        tree.sort_by_code();

        tree
    }

    fn sort_by_code(&mut self) {
        let accounts = &self.accounts;
        self.roots
            .sort_by(|&a, &b| accounts[a].code.cmp(&accounts[b].code));
        for list in &mut self.children {
            list.sort_by(|&a, &b| accounts[a].code.cmp(&accounts[b].code));
        }
    }

    fn reachable(&self) -> Vec<bool> {
        let mut visited = vec![false; self.accounts.len()];
        for &root in &self.roots {
            self.mark_subtree(root, &mut visited);
        }
        visited
    }

    fn mark_subtree(&self, start: usize, visited: &mut [bool]) {
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut visited[i], true) {
                continue;
            }
            stack.extend(self.children[i].iter().copied());
        }
    }

    /// Pre-order `(index, depth)` walk from the given starting nodes
    fn walk(&self, starts: &[usize]) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(self.accounts.len());
        let mut visited = vec![false; self.accounts.len()];
        let mut stack: Vec<(usize, usize)> = starts.iter().rev().map(|&i| (i, 0)).collect();

        while let Some((i, depth)) = stack.pop() {
            if std::mem::replace(&mut visited[i], true) {
                continue;
            }
            out.push((i, depth));
            stack.extend(self.children[i].iter().rev().map(|&c| (c, depth + 1)));
        }

        out
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, account_id: &str) -> Option<&Account> {
        self.index.get(account_id).map(|&i| &self.accounts[i])
    }

    pub fn roots(&self) -> impl Iterator<Item = &Account> {
        self.roots.iter().map(|&i| &self.accounts[i])
    }

    /// Direct children, ordered by code
    pub fn children_of(&self, account_id: &str) -> Vec<&Account> {
        self.index
            .get(account_id)
            .map(|&i| self.children[i].iter().map(|&c| &self.accounts[c]).collect())
            .unwrap_or_default()
    }

    /// Keep accounts whose code or name contains `query` (case-insensitive),
    /// together with every ancestor of such an account.
    pub fn filter(&self, query: &str) -> AccountTree {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.clone();
        }

        let order = self.walk(&self.roots);
        let mut keep = vec![false; self.accounts.len()];
        // Reverse pre-order visits children before their parents.
        for &(i, _) in order.iter().rev() {
            let account = &self.accounts[i];
            let matches = account.code.to_lowercase().contains(&needle)
                || account.name.to_lowercase().contains(&needle);
            keep[i] = matches || self.children[i].iter().any(|&c| keep[c]);
        }

        let kept = order
            .iter()
            .filter(|(i, _)| keep[*i])
            .map(|(i, _)| self.accounts[*i].clone())
            .collect();
        AccountTree::build(kept)
    }

    /// Pre-order listing with depth, roots first in code order
    pub fn flatten_for_select(&self) -> Vec<SelectOption> {
        self.walk(&self.roots)
            .into_iter()
            .map(|(i, depth)| SelectOption {
                account: self.accounts[i].clone(),
                depth,
            })
            .collect()
    }

    /// Ids of an account and all of its descendants, pre-order.
    /// Empty if the account is not in the tree.
    pub fn subtree_ids(&self, account_id: &str) -> Vec<String> {
        match self.index.get(account_id) {
            Some(&i) => self
                .walk(&[i])
                .into_iter()
                .map(|(j, _)| self.accounts[j].id.clone())
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountType;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn account(id: &str, code: &str, name: &str, parent: Option<&str>) -> Account {
        let mut a = Account::new(code, name, AccountType::Asset, parent.map(String::from));
        a.id = id.to_string();
        a
    }

    fn chart() -> Vec<Account> {
        vec![
            account("cash", "1100", "Cash at Bank", Some("assets")),
            account("assets", "1000", "Assets", None),
            account("materials", "1310", "Materials on Site", Some("inventory")),
            account("inventory", "1300", "Inventory", Some("assets")),
            account("payables", "2100", "Trade Payables", None),
        ]
    }

    fn codes(options: &[SelectOption]) -> Vec<(String, usize)> {
        options
            .iter()
            .map(|o| (o.account.code.clone(), o.depth))
            .collect()
    }

    #[test]
    fn build_orders_pre_order_by_code() {
        let tree = AccountTree::build(chart());
        assert_eq!(
            codes(&tree.flatten_for_select()),
            vec![
                ("1000".to_string(), 0),
                ("1100".to_string(), 1),
                ("1300".to_string(), 1),
                ("1310".to_string(), 2),
                ("2100".to_string(), 0),
            ]
        );
        assert_eq!(tree.children_of("assets").len(), 2);
    }

    #[test]
    fn orphan_becomes_root() {
        let tree = AccountTree::build(vec![account("x", "9000", "Orphan", Some("missing"))]);
        assert_eq!(tree.roots().count(), 1);
    }

    #[test]
    fn stored_cycle_is_broken_not_looped() {
        let tree = AccountTree::build(vec![
            account("a", "1", "A", Some("b")),
            account("b", "2", "B", Some("a")),
            account("c", "3", "C", Some("c")),
        ]);
        let flat = tree.flatten_for_select();
        assert_eq!(flat.len(), 3);
        let ids: HashSet<_> = flat.iter().map(|o| o.account.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn filter_keeps_ancestor_chain() {
        let tree = AccountTree::build(chart()).filter("site");
        assert_eq!(
            codes(&tree.flatten_for_select()),
            vec![
                ("1000".to_string(), 0),
                ("1300".to_string(), 1),
                ("1310".to_string(), 2),
            ]
        );
    }

    #[test]
    fn filter_matches_code_and_ignores_case() {
        let tree = AccountTree::build(chart());
        assert_eq!(tree.filter("2100").len(), 1);
        assert_eq!(tree.filter("CASH").len(), 2);
        assert_eq!(tree.filter("   ").len(), 5);
        assert!(tree.filter("nothing-like-this").is_empty());
    }

    #[test]
    fn subtree_is_pre_order() {
        let tree = AccountTree::build(chart());
        assert_eq!(
            tree.subtree_ids("assets"),
            vec!["assets", "cash", "inventory", "materials"]
        );
        assert!(tree.subtree_ids("missing").is_empty());
    }

    /// Random forests: account `i` may only point at an earlier index, or at nothing.
    fn arb_forest() -> impl Strategy<Value = Vec<Account>> {
        prop::collection::vec(any::<prop::sample::Index>(), 0..40).prop_map(|picks| {
            picks
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    let parent = if i == 0 || pick.index(3) == 0 {
                        None
                    } else {
                        Some(format!("acc-{}", pick.index(i)))
                    };
                    account(
                        &format!("acc-{i}"),
                        &format!("{:04}", i),
                        &format!("Account {i}"),
                        parent.as_deref(),
                    )
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn flatten_visits_every_account_once_after_its_parent(accounts in arb_forest()) {
            let n = accounts.len();
            let tree = AccountTree::build(accounts.clone());
            let flat = tree.flatten_for_select();
            prop_assert_eq!(flat.len(), n);

            let position: HashMap<&str, usize> = flat
                .iter()
                .enumerate()
                .map(|(pos, o)| (o.account.id.as_str(), pos))
                .collect();
            prop_assert_eq!(position.len(), n);

            for option in &flat {
                if let Some(parent) = &option.account.parent_id {
                    prop_assert!(position[parent.as_str()] < position[option.account.id.as_str()]);
                }
            }
        }

        #[test]
        fn filter_result_is_closed_under_ancestors(accounts in arb_forest(), q in "[0-9]{1,2}") {
            let tree = AccountTree::build(accounts);
            let filtered = tree.filter(&q);
            for option in filtered.flatten_for_select() {
                if let Some(parent) = &option.account.parent_id {
                    prop_assert!(filtered.get(parent).is_some());
                }
            }
        }
    }
}
