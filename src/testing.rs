//! In-memory [`LabelService`] used by unit tests
//!
//! Each test builds its own instance, so no state leaks between tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::{normalize_color, Repository};
use crate::error::{Error, Result};
use crate::github::{GitHubLabel, IssueRef, LabelService, SearchResult};

/// A recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListLabels(String),
    GetLabel(String, String),
    CreateLabel(String, String, String),
    EditLabel(String, String, String),
    DeleteLabel(String, String),
    AddLabel(String, u64, String),
    RemoveLabel(String, u64, String),
    Search(String),
}

impl Call {
    /// Whether this call changes remote state
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Call::ListLabels(_) | Call::GetLabel(..) | Call::Search(_)
        )
    }
}

#[derive(Default)]
struct RepoState {
    labels: Vec<GitHubLabel>,
    issues: BTreeMap<u64, Vec<String>>,
}

#[derive(Default)]
struct State {
    repos: BTreeMap<String, RepoState>,
    calls: Vec<Call>,
    scripted_searches: VecDeque<SearchResult>,
    fail_on: Option<&'static str>,
    fail_nth: Option<(&'static str, usize)>,
    counts: HashMap<&'static str, usize>,
    next_id: u64,
}

/// Fake tracker holding labels and issue tagging per repository
#[derive(Default)]
pub struct MockLabelService {
    state: Mutex<State>,
}

impl MockLabelService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a label in a repository
    pub fn with_label(self, repo: &str, name: &str, color: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state
                .repos
                .entry(repo.to_string())
                .or_default()
                .labels
                .push(GitHubLabel {
                    id,
                    name: name.to_string(),
                    color: color.to_string(),
                    description: None,
                    default: false,
                    url: format!("https://api.github.com/repos/{}/labels/{}", repo, name),
                });
        }
        self
    }

    /// Define an issue with the given labels
    pub fn with_issue(self, repo: &str, number: u64, labels: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .repos
            .entry(repo.to_string())
            .or_default()
            .issues
            .insert(number, labels.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Queue a fixed search response, returned instead of the live result
    pub fn with_scripted_search(self, numbers: &[u64]) -> Self {
        let total = numbers.len() as u64;
        self.with_scripted_search_total(numbers, total)
    }

    /// Queue a search response whose reported total differs from the items
    pub fn with_scripted_search_total(self, numbers: &[u64], total_count: u64) -> Self {
        let items = numbers
            .iter()
            .map(|&number| IssueRef {
                number,
                title: String::new(),
            })
            .collect();
        self.state
            .lock()
            .unwrap()
            .scripted_searches
            .push_back(SearchResult { total_count, items });
        self
    }

    /// Make every call of the named kind fail (e.g. "create", "search")
    pub fn failing_on(self, operation: &'static str) -> Self {
        self.state.lock().unwrap().fail_on = Some(operation);
        self
    }

    /// Make only the `nth` call (1-based) of the named kind fail
    pub fn failing_on_nth(self, operation: &'static str, nth: usize) -> Self {
        self.state.lock().unwrap().fail_nth = Some((operation, nth));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn label_names(&self, repo: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .repos
            .get(repo)
            .map(|r| r.labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn issue_labels(&self, repo: &str, number: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .repos
            .get(repo)
            .and_then(|r| r.issues.get(&number).cloned())
            .unwrap_or_default()
    }

    fn record(
        &self,
        call: Call,
        operation: &'static str,
    ) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        let count = state.counts.entry(operation).or_insert(0);
        *count += 1;
        let count = *count;
        if state.fail_on == Some(operation) || state.fail_nth == Some((operation, count)) {
            return Err(Error::generic(format!("simulated {} failure", operation)));
        }
        Ok(state)
    }
}

/// Extract `owner/name` and the quoted value from `repo:owner/name kind:"value"`
fn parse_query(query: &str) -> (String, String) {
    let repo = query
        .strip_prefix("repo:")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_default()
        .to_string();
    let value = query
        .split_once(":\"")
        .map(|(_, rest)| rest.trim_end_matches('"').to_string())
        .unwrap_or_default();
    (repo, value)
}

#[async_trait]
impl LabelService for MockLabelService {
    async fn list_labels(&self, repo: &Repository) -> Result<Vec<GitHubLabel>> {
        let key = repo.to_string();
        let state = self.record(Call::ListLabels(key.clone()), "list")?;
        Ok(state
            .repos
            .get(&key)
            .map(|r| r.labels.clone())
            .unwrap_or_default())
    }

    async fn get_label(&self, repo: &Repository, name: &str) -> Result<GitHubLabel> {
        let key = repo.to_string();
        let state = self.record(Call::GetLabel(key.clone(), name.to_string()), "get")?;
        state
            .repos
            .get(&key)
            .and_then(|r| r.labels.iter().find(|l| l.name == name).cloned())
            .ok_or_else(|| Error::generic(format!("label {} Not Found", name)))
    }

    async fn create_label(
        &self,
        repo: &Repository,
        name: &str,
        color: &str,
    ) -> Result<GitHubLabel> {
        let key = repo.to_string();
        let mut state = self.record(
            Call::CreateLabel(key.clone(), name.to_string(), color.to_string()),
            "create",
        )?;
        state.next_id += 1;
        let label = GitHubLabel {
            id: state.next_id,
            name: name.to_string(),
            color: normalize_color(color),
            description: None,
            default: false,
            url: format!("https://api.github.com/repos/{}/labels/{}", key, name),
        };
        state
            .repos
            .entry(key)
            .or_default()
            .labels
            .push(label.clone());
        Ok(label)
    }

    async fn edit_label(&self, repo: &Repository, name: &str, color: &str) -> Result<GitHubLabel> {
        let key = repo.to_string();
        let mut state = self.record(
            Call::EditLabel(key.clone(), name.to_string(), color.to_string()),
            "edit",
        )?;
        let label = state
            .repos
            .get_mut(&key)
            .and_then(|r| r.labels.iter_mut().find(|l| l.name == name))
            .ok_or_else(|| Error::generic(format!("label {} Not Found", name)))?;
        label.color = normalize_color(color);
        Ok(label.clone())
    }

    async fn delete_label(&self, repo: &Repository, name: &str) -> Result<()> {
        let key = repo.to_string();
        let mut state = self.record(Call::DeleteLabel(key.clone(), name.to_string()), "delete")?;
        if let Some(repo_state) = state.repos.get_mut(&key) {
            repo_state.labels.retain(|l| l.name != name);
            for labels in repo_state.issues.values_mut() {
                labels.retain(|l| l != name);
            }
        }
        Ok(())
    }

    async fn add_label_to_issue(&self, repo: &Repository, number: u64, label: &str) -> Result<()> {
        let key = repo.to_string();
        let mut state = self.record(Call::AddLabel(key.clone(), number, label.to_string()), "add")?;
        let labels = state
            .repos
            .entry(key)
            .or_default()
            .issues
            .entry(number)
            .or_default();
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
        Ok(())
    }

    async fn remove_label_from_issue(
        &self,
        repo: &Repository,
        number: u64,
        label: &str,
    ) -> Result<()> {
        let key = repo.to_string();
        let mut state = self.record(
            Call::RemoveLabel(key.clone(), number, label.to_string()),
            "remove",
        )?;
        if let Some(labels) = state
            .repos
            .get_mut(&key)
            .and_then(|r| r.issues.get_mut(&number))
        {
            labels.retain(|l| l != label);
        }
        Ok(())
    }

    async fn search_issues(&self, query: &str) -> Result<SearchResult> {
        let mut state = self.record(Call::Search(query.to_string()), "search")?;
        if let Some(scripted) = state.scripted_searches.pop_front() {
            return Ok(scripted);
        }

        let (repo, value) = parse_query(query);
        let items: Vec<IssueRef> = state
            .repos
            .get(&repo)
            .map(|r| {
                r.issues
                    .iter()
                    .filter(|(_, labels)| labels.iter().any(|l| *l == value))
                    .map(|(number, _)| IssueRef {
                        number: *number,
                        title: format!("Issue {}", number),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(SearchResult {
            total_count: items.len() as u64,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let (repo, value) = parse_query("repo:acme/widgets label:\"good first issue\"");
        assert_eq!(repo, "acme/widgets");
        assert_eq!(value, "good first issue");
    }
}
