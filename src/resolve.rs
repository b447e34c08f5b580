//! Resolution policy: pick the file to keep in each duplicate group.
//!
//! # Overview
//!
//! Given a [`DuplicateGroup`], the [`Resolver`] deterministically selects the
//! member to retain and marks every other member for action. The default
//! action is a move into the review directory; deletion happens only when it
//! was explicitly enabled in configuration.
//!
//! Keeper selection evaluates a fixed tie-break chain in sequence until one
//! candidate remains: the rule's primary criterion first, then shortest path
//! string, earliest modified time, and finally the lexicographically smallest
//! absolute path. The last criterion is a total order, so ties are
//! impossible.
//!
//! Review targets preserve the original file name; a would-be collision
//! (against files already in the review directory or targets assigned
//! earlier in the same run) gets a deterministic `_N` counter suffix rather
//! than overwriting anything.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;
use crate::scanner::FileRecord;

/// Rule selecting which duplicate to retain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepRule {
    /// Keep the file with the shortest path string.
    #[default]
    ShortestPath,
    /// Keep the file with the earliest modification time.
    OldestModified,
}

/// What to do with one member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum Action {
    /// Retain the file where it is.
    Keep,
    /// Move the file into the review directory at the given target path.
    MoveToReview(PathBuf),
    /// Delete the file. Requires explicit opt-in configuration.
    Delete,
}

/// One decision per group member, consumed exactly once by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// The group member this decision applies to
    pub record: FileRecord,
    /// The action to perform
    pub action: Action,
    /// Policy explanation ("shortest path retained", ...)
    pub reason: String,
}

impl Decision {
    /// Whether this decision keeps the file in place.
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self.action, Action::Keep)
    }
}

/// Tie-break criteria evaluated in sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Criterion {
    ShortestPath,
    OldestModified,
    LexicographicPath,
}

impl Criterion {
    fn reason(self) -> &'static str {
        match self {
            Self::ShortestPath => "shortest path retained",
            Self::OldestModified => "earliest modified time retained",
            Self::LexicographicPath => "lexicographically smallest path retained",
        }
    }
}

/// Stateful resolver for one run.
///
/// Holds the run-scoped set of allocated review names so two groups can
/// never be assigned the same target.
#[derive(Debug)]
pub struct Resolver {
    rule: KeepRule,
    review_dir: PathBuf,
    delete_duplicates: bool,
    used_names: HashSet<String>,
}

impl Resolver {
    /// Create a resolver for the given rule and review destination.
    #[must_use]
    pub fn new(rule: KeepRule, review_dir: PathBuf, delete_duplicates: bool) -> Self {
        Self {
            rule,
            review_dir,
            delete_duplicates,
            used_names: HashSet::new(),
        }
    }

    /// Produce one decision per group member.
    ///
    /// Deterministic: resolving the same group twice with the same rule (in
    /// a fresh resolver) yields identical decisions.
    pub fn resolve(&mut self, group: &DuplicateGroup) -> Vec<Decision> {
        let (keeper, criterion) = select_keeper(&group.files, self.rule);
        let keeper_path = group.files[keeper].path.clone();

        log::debug!(
            "Group {}: keeping {} ({})",
            group.digest_hex(),
            keeper_path.display(),
            criterion.reason()
        );

        group
            .files
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                if idx == keeper {
                    Decision {
                        record: record.clone(),
                        action: Action::Keep,
                        reason: criterion.reason().to_string(),
                    }
                } else if self.delete_duplicates {
                    Decision {
                        record: record.clone(),
                        action: Action::Delete,
                        reason: format!("duplicate of {}", keeper_path.display()),
                    }
                } else {
                    let target = self.allocate_target(&record.path);
                    Decision {
                        record: record.clone(),
                        action: Action::MoveToReview(target),
                        reason: format!("duplicate of {}", keeper_path.display()),
                    }
                }
            })
            .collect()
    }

    /// Pick a collision-free target inside the review directory.
    ///
    /// The original file name is preserved when possible; otherwise a `_N`
    /// counter suffix is appended, counting up deterministically.
    fn allocate_target(&mut self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let extension = Path::new(&name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()));

        let mut candidate = name.clone();
        let mut counter = 0usize;
        loop {
            let taken = self.used_names.contains(&candidate)
                || self.review_dir.join(&candidate).exists();
            if !taken {
                self.used_names.insert(candidate.clone());
                return self.review_dir.join(candidate);
            }
            counter += 1;
            candidate = match &extension {
                Some(ext) => format!("{}_{}{}", stem, counter, ext),
                None => format!("{}_{}", stem, counter),
            };
        }
    }
}

/// Select the index of the member to keep and the criterion that decided it.
///
/// Candidates are narrowed criterion by criterion; the lexicographic path
/// comparison guarantees a unique survivor.
fn select_keeper(files: &[FileRecord], rule: KeepRule) -> (usize, Criterion) {
    debug_assert!(!files.is_empty(), "cannot resolve an empty group");

    let chain: Vec<Criterion> = match rule {
        KeepRule::ShortestPath => vec![
            Criterion::ShortestPath,
            Criterion::OldestModified,
            Criterion::LexicographicPath,
        ],
        KeepRule::OldestModified => vec![
            Criterion::OldestModified,
            Criterion::ShortestPath,
            Criterion::LexicographicPath,
        ],
    };

    let mut candidates: Vec<usize> = (0..files.len()).collect();
    for criterion in chain {
        narrow(files, &mut candidates, criterion);
        if candidates.len() == 1 {
            return (candidates[0], criterion);
        }
    }

    // Unreachable: lexicographic path order is total over distinct paths.
    (candidates[0], Criterion::LexicographicPath)
}

/// Retain only the candidates minimal under the given criterion.
fn narrow(files: &[FileRecord], candidates: &mut Vec<usize>, criterion: Criterion) {
    match criterion {
        Criterion::ShortestPath => {
            let best = candidates
                .iter()
                .map(|&i| files[i].path.as_os_str().len())
                .min()
                .expect("non-empty candidates");
            candidates.retain(|&i| files[i].path.as_os_str().len() == best);
        }
        Criterion::OldestModified => {
            let best = candidates
                .iter()
                .map(|&i| files[i].modified)
                .min()
                .expect("non-empty candidates");
            candidates.retain(|&i| files[i].modified == best);
        }
        Criterion::LexicographicPath => {
            let best = candidates
                .iter()
                .map(|&i| files[i].path.clone())
                .min()
                .expect("non-empty candidates");
            candidates.retain(|&i| files[i].path == best);
        }
    }
}
