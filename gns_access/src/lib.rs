//! Access/Group file parsing and effective-rights resolution.
//!
//! An Access file governs the directory it lives in (and every descendant
//! that has no closer Access file of its own). Each line names a right and
//! a comma-separated principal list:
//!
//! ```text
//! read: alice@example.com, bob+work@example.com
//! list, read: family@example.com/Group/friends
//! write, create, delete: alice@example.com
//! administer: alice@example.com
//! ```
//!
//! A principal is either a user name or a reference to a Group file
//! (`owner@domain/Group/name`), whose contents are a newline-separated list
//! of further principals, expanded recursively up to a bounded depth.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use gns_core::Hash;
use gns_path::{PathName, UserName};

const MAX_GROUP_DEPTH: usize = 8;

#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    #[error("unknown right '{0}'")]
    UnknownRight(String),
    #[error("malformed principal '{0}'")]
    MalformedPrincipal(String),
    #[error("group expansion exceeded depth {0}")]
    DepthExceeded(usize),
    #[error("group reference cycle detected at '{0}'")]
    GroupCycle(String),
    #[error(transparent)]
    Path(#[from] gns_path::PathError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One of the six rights an Access file line can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Right {
    Read,
    Write,
    List,
    Create,
    Delete,
    Administer,
}

impl Right {
    pub const ALL: [Right; 6] = [
        Right::Read,
        Right::Write,
        Right::List,
        Right::Create,
        Right::Delete,
        Right::Administer,
    ];

    fn parse(s: &str) -> Result<Self, AccessError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Right::Read),
            "write" => Ok(Right::Write),
            "list" => Ok(Right::List),
            "create" => Ok(Right::Create),
            "delete" => Ok(Right::Delete),
            "administer" => Ok(Right::Administer),
            other => Err(AccessError::UnknownRight(other.to_string())),
        }
    }
}

/// A principal named on an Access or Group file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Every authenticated user.
    All,
    User(UserName),
    /// A reference to another Group file, expanded recursively.
    Group(PathName),
}

impl Principal {
    fn parse(s: &str) -> Result<Self, AccessError> {
        let s = s.trim();
        if s == "*" {
            return Ok(Principal::All);
        }
        if s.contains('/') {
            return Ok(Principal::Group(PathName::parse(s)?));
        }
        Ok(Principal::User(UserName::parse(s)?))
    }
}

/// A parsed Access file: for each right, the principals holding it.
#[derive(Debug, Clone, Default)]
pub struct AccessFile {
    pub grants: HashMap<Right, Vec<Principal>>,
}

impl AccessFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, AccessError> {
        let text = String::from_utf8_lossy(bytes);
        let mut grants: HashMap<Right, Vec<Principal>> = HashMap::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((rights_part, principals_part)) = line.split_once(':') else {
                return Err(AccessError::MalformedPrincipal(line.to_string()));
            };
            let rights: Vec<Right> = rights_part
                .split(',')
                .map(Right::parse)
                .collect::<Result<_, _>>()?;
            let principals: Vec<Principal> = principals_part
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Principal::parse)
                .collect::<Result<_, _>>()?;
            for right in rights {
                grants.entry(right).or_default().extend(principals.clone());
            }
        }
        Ok(Self { grants })
    }

    /// The default Access file for a user tree with no explicit Access
    /// file anywhere: the owner has every right, no one else has any.
    pub fn owner_only(owner: &UserName) -> Self {
        let mut grants = HashMap::new();
        for right in Right::ALL {
            grants.insert(right, vec![Principal::User(owner.clone())]);
        }
        Self { grants }
    }
}

/// A parsed Group file: a flat list of member principals (each possibly
/// itself a nested group reference).
#[derive(Debug, Clone, Default)]
pub struct GroupFile {
    pub members: Vec<Principal>,
}

impl GroupFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, AccessError> {
        let text = String::from_utf8_lossy(bytes);
        let mut members = Vec::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            for entry in line.split(',') {
                let entry = entry.trim();
                if !entry.is_empty() {
                    members.push(Principal::parse(entry)?);
                }
            }
        }
        Ok(Self { members })
    }
}

/// Outcome of [`AccessResolver::check`]: either a definite grant/deny, or a
/// recoverable indication that a Group file must be fetched before the
/// caller can retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied,
    NeedGroup(PathName),
}

/// Supplies file content to the resolver: directory lookups for locating
/// the governing Access file, and plain reads for Access/Group file
/// byties. Implemented by the directory engine; kept abstract here so this
/// crate has no dependency on directory state.
#[async_trait::async_trait]
pub trait FileFetcher: Send + Sync {
    /// Returns the content and its hash if `path` names an existing,
    /// readable file.
    async fn fetch(&self, path: &PathName) -> anyhow::Result<Option<(Bytes, Hash)>>;

    /// Lists the sibling entries of `dir` (used to check whether an
    /// `Access` file exists directly inside it) without requiring a full
    /// directory listing API in this crate.
    async fn has_child(&self, dir: &PathName, name: &str) -> anyhow::Result<bool>;
}

struct CachedFile {
    content_hash: Hash,
    access: Option<AccessFile>,
    group: Option<GroupFile>,
}

/// Resolves effective rights for `(principal, path)` pairs, walking parent
/// directories for the governing Access file and expanding Group
/// indirection, with a bounded memoization cache keyed by canonical path.
pub struct AccessResolver<F: FileFetcher> {
    fetcher: Arc<F>,
    cache: DashMap<String, CachedFile>,
}

impl<F: FileFetcher> AccessResolver<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            cache: DashMap::new(),
        }
    }

    /// Invalidates any cached parse of `path`; called by the directory
    /// engine whenever an Access or Group file is written.
    pub fn invalidate(&self, path: &PathName) {
        self.cache.remove(&path.canonical());
    }

    /// Finds the directory that governs `path`: the nearest ancestor
    /// (starting at `path`'s own directory) containing an `Access` file,
    /// or `None` if no tree has one.
    pub async fn which_access(&self, path: &PathName) -> anyhow::Result<Option<PathName>> {
        let mut dir = if path.is_root() {
            path.clone()
        } else {
            path.parent().unwrap_or_else(|| path.clone())
        };
        loop {
            if self.fetcher.has_child(&dir, "Access").await? {
                return Ok(Some(dir.child("Access")));
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Ok(None),
            }
        }
    }

    async fn load_access(&self, access_path: &PathName) -> Result<AccessFile, AccessError> {
        let key = access_path.canonical();
        let (bytes, hash) = self
            .fetcher
            .fetch(access_path)
            .await?
            .ok_or_else(|| AccessError::Other(anyhow::anyhow!("Access file vanished: {access_path}")))?;

        if let Some(cached) = self.cache.get(&key) {
            if cached.content_hash == hash {
                if let Some(parsed) = &cached.access {
                    return Ok(parsed.clone());
                }
            }
        }
        let parsed = AccessFile::parse(&bytes)?;
        self.cache.insert(
            key,
            CachedFile {
                content_hash: hash,
                access: Some(parsed.clone()),
                group: None,
            },
        );
        Ok(parsed)
    }

    async fn load_group(&self, group_path: &PathName) -> Result<GroupFile, AccessError> {
        let key = group_path.canonical();
        let (bytes, hash) = self
            .fetcher
            .fetch(group_path)
            .await?
            .ok_or_else(|| AccessError::Other(anyhow::anyhow!("Group file vanished: {group_path}")))?;

        if let Some(cached) = self.cache.get(&key) {
            if cached.content_hash == hash {
                if let Some(parsed) = &cached.group {
                    return Ok(parsed.clone());
                }
            }
        }
        let parsed = GroupFile::parse(&bytes)?;
        self.cache.insert(
            key,
            CachedFile {
                content_hash: hash,
                access: None,
                group: Some(parsed.clone()),
            },
        );
        Ok(parsed)
    }

    /// Checks whether `principal` holds `right` over `path`. A return of
    /// `NeedGroup(missing)` means the caller should fetch `missing` (e.g.
    /// via replication or a remote lookup) and retry; it is not a denial.
    pub async fn check(&self, path: &PathName, principal: &UserName, right: Right) -> Result<Decision, AccessError> {
        let access_path = self.which_access(path).await?;
        let access = match access_path {
            Some(ref p) => self.load_access(p).await?,
            None => AccessFile::owner_only(&path.user),
        };

        let principals = match access.grants.get(&right) {
            Some(p) => p,
            None => return Ok(Decision::Denied),
        };

        let mut seen_groups = Vec::new();
        for p in principals {
            match self.expand_and_match(p, principal, 0, &mut seen_groups).await? {
                Decision::Granted => return Ok(Decision::Granted),
                Decision::NeedGroup(missing) => return Ok(Decision::NeedGroup(missing)),
                Decision::Denied => continue,
            }
        }
        Ok(Decision::Denied)
    }

    fn expand_and_match<'a>(
        &'a self,
        principal_entry: &'a Principal,
        target: &'a UserName,
        depth: usize,
        seen_groups: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Decision, AccessError>> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_GROUP_DEPTH {
                return Err(AccessError::DepthExceeded(MAX_GROUP_DEPTH));
            }
            match principal_entry {
                Principal::All => Ok(Decision::Granted),
                Principal::User(u) => Ok(if u == target { Decision::Granted } else { Decision::Denied }),
                Principal::Group(group_path) => {
                    let key = group_path.canonical();
                    if seen_groups.contains(&key) {
                        return Err(AccessError::GroupCycle(key));
                    }
                    seen_groups.push(key);

                    let group = match self.load_group(group_path).await {
                        Ok(g) => g,
                        Err(AccessError::Other(_)) => return Ok(Decision::NeedGroup(group_path.clone())),
                        Err(e) => return Err(e),
                    };
                    for member in &group.members {
                        match self.expand_and_match(member, target, depth + 1, seen_groups).await? {
                            Decision::Granted => return Ok(Decision::Granted),
                            Decision::NeedGroup(missing) => return Ok(Decision::NeedGroup(missing)),
                            Decision::Denied => continue,
                        }
                    }
                    Ok(Decision::Denied)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeFetcher {
        files: Mutex<HashMap<String, (Bytes, Hash)>>,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self { files: Mutex::new(HashMap::new()) }
        }

        fn put(&self, path: &str, content: &str) {
            let bytes = Bytes::from(content.to_string());
            let hash = Hash::new(&bytes);
            self.files.lock().unwrap().insert(path.to_string(), (bytes, hash));
        }
    }

    #[async_trait::async_trait]
    impl FileFetcher for FakeFetcher {
        async fn fetch(&self, path: &PathName) -> anyhow::Result<Option<(Bytes, Hash)>> {
            Ok(self.files.lock().unwrap().get(&path.canonical()).cloned())
        }

        async fn has_child(&self, dir: &PathName, name: &str) -> anyhow::Result<bool> {
            let child = dir.child(name).canonical();
            Ok(self.files.lock().unwrap().contains_key(&child))
        }
    }

    #[tokio::test]
    async fn owner_only_default_when_no_access_file() -> Result<(), AccessError> {
        let fetcher = Arc::new(FakeFetcher::new());
        let resolver = AccessResolver::new(fetcher);
        let owner = UserName::parse("alice@example.com")?;
        let stranger = UserName::parse("mallory@example.com")?;
        let path = PathName::parse("alice@example.com/notes.txt")?;

        assert_eq!(resolver.check(&path, &owner, Right::Read).await?, Decision::Granted);
        assert_eq!(resolver.check(&path, &stranger, Right::Read).await?, Decision::Denied);
        Ok(())
    }

    #[tokio::test]
    async fn explicit_access_file_grants_named_user() -> Result<(), AccessError> {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.put("alice@example.com/Access", "read, list: bob@example.com\nwrite: alice@example.com\n");
        let resolver = AccessResolver::new(fetcher);
        let bob = UserName::parse("bob@example.com")?;
        let path = PathName::parse("alice@example.com/notes.txt")?;

        assert_eq!(resolver.check(&path, &bob, Right::Read).await?, Decision::Granted);
        assert_eq!(resolver.check(&path, &bob, Right::Write).await?, Decision::Denied);
        Ok(())
    }

    #[tokio::test]
    async fn group_expansion_grants_member() -> Result<(), AccessError> {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.put(
            "alice@example.com/Access",
            "read: alice@example.com/Group/friends\n",
        );
        fetcher.put("alice@example.com/Group/friends", "carol@example.com, dave@example.com\n");
        let resolver = AccessResolver::new(fetcher);
        let carol = UserName::parse("carol@example.com")?;
        let erin = UserName::parse("erin@example.com")?;
        let path = PathName::parse("alice@example.com/notes.txt")?;

        assert_eq!(resolver.check(&path, &carol, Right::Read).await?, Decision::Granted);
        assert_eq!(resolver.check(&path, &erin, Right::Read).await?, Decision::Denied);
        Ok(())
    }

    #[tokio::test]
    async fn missing_group_file_yields_need_group() -> Result<(), AccessError> {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.put("alice@example.com/Access", "read: alice@example.com/Group/friends\n");
        let resolver = AccessResolver::new(fetcher);
        let carol = UserName::parse("carol@example.com")?;
        let path = PathName::parse("alice@example.com/notes.txt")?;

        let decision = resolver.check(&path, &carol, Right::Read).await?;
        assert_eq!(decision, Decision::NeedGroup(PathName::parse("alice@example.com/Group/friends")?));
        Ok(())
    }

    #[test]
    fn parses_multiple_right_lines() -> Result<(), AccessError> {
        let access = AccessFile::parse(b"list, read: bob@example.com\nadminister: alice@example.com\n")?;
        assert_eq!(access.grants[&Right::List].len(), 1);
        assert_eq!(access.grants[&Right::Read].len(), 1);
        assert_eq!(access.grants[&Right::Administer].len(), 1);
        Ok(())
    }
}
