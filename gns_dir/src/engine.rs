//! The directory engine: the crate's public surface, composing one
//! [`crate::actor::DirActorHandle`] per user with an access resolver that
//! gates every externally visible operation.

use std::sync::Arc;

use dashmap::DashMap;
use gns_access::{AccessResolver, Decision, Right};
use gns_core::{GnsError, GnsResult};
use gns_pack::{BlockDescriptor, Packing};
use gns_path::{glob_match_element, PathName, UserName};

use crate::actor::{self, DirActorHandle};
use crate::context::DirContext;
use crate::entry::Entry;
use crate::fetcher::EngineFetcher;

/// Composes every user's directory actor behind one access-checked facade.
pub struct DirectoryEngine {
    actors: DashMap<UserName, DirActorHandle>,
    ctx: Arc<DirContext>,
    access: AccessResolver<EngineFetcher>,
}

impl DirectoryEngine {
    pub fn new(ctx: DirContext) -> Arc<Self> {
        let ctx = Arc::new(ctx);
        Arc::new_cyclic(|weak| {
            let fetcher = Arc::new(EngineFetcher::new(weak.clone()));
            DirectoryEngine { actors: DashMap::new(), ctx, access: AccessResolver::new(fetcher) }
        })
    }

    pub(crate) fn handle_for(&self, user: &UserName) -> DirActorHandle {
        if let Some(handle) = self.actors.get(user) {
            return handle.clone();
        }
        let handle = actor::spawn(user.clone(), self.ctx.clone());
        self.actors.entry(user.clone()).or_insert(handle).clone()
    }

    fn access_err(decision: Decision, path: &PathName) -> GnsError {
        match decision {
            Decision::Denied => GnsError::permission(format!("{path}: access denied")),
            Decision::NeedGroup(g) => GnsError::internal(format!("group file {g} could not be resolved")),
            Decision::Granted => unreachable!("caller already matched Granted"),
        }
    }

    /// Owners always pass (invariant 7); everyone else is subject to the
    /// governing Access file, including the implicit `List` a `Lookup` or
    /// `Children` call requires.
    async fn require(&self, path: &PathName, principal: &UserName, right: Right) -> GnsResult<()> {
        if principal == &path.user {
            return Ok(());
        }
        match self.access.check(path, principal, right).await {
            Ok(Decision::Granted) => Ok(()),
            Ok(other) => Err(Self::access_err(other, path)),
            Err(e) => Err(GnsError::internal(e.to_string())),
        }
    }

    fn enforce_plain_packing(path: &PathName, packing: Packing) -> GnsResult<()> {
        let governs_access = path.last().map(|n| n == "Access" || n == "Group").unwrap_or(false);
        if governs_access && packing.encrypts() {
            return Err(GnsError::invalid(format!(
                "{path}: Access and Group files must use a non-encrypting packing so the directory engine can read them"
            )));
        }
        Ok(())
    }

    pub async fn lookup(&self, caller: &UserName, path: &PathName) -> GnsResult<Entry> {
        self.require(path, caller, Right::List).await?;
        self.handle_for(&path.user).lookup(path.clone()).await
    }

    pub async fn children(&self, caller: &UserName, dir: &PathName) -> GnsResult<Vec<Entry>> {
        self.require(dir, caller, Right::List).await?;
        self.handle_for(&dir.user).children(dir.clone()).await
    }

    /// Lists `dir`'s children whose names match `pattern` (a single shell
    /// glob element).
    pub async fn glob(&self, caller: &UserName, dir: &PathName, pattern: &str) -> GnsResult<Vec<Entry>> {
        let mut matches: Vec<Entry> =
            self.children(caller, dir).await?.into_iter().filter(|e| glob_match_element(pattern, e.local_name())).collect();
        matches.sort_by(|a, b| a.local_name().cmp(b.local_name()));
        Ok(matches)
    }

    pub async fn read(&self, caller: &UserName, path: &PathName) -> GnsResult<bytes::Bytes> {
        self.require(path, caller, Right::Read).await?;
        let (bytes, _hash) = self.handle_for(&path.user).fetch_bytes(path.clone()).await?;
        Ok(bytes)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn put(
        &self,
        caller: &UserName,
        path: &PathName,
        signed_name: String,
        packing: Packing,
        writer: [u8; 32],
        time: u64,
        attr: u8,
        blocks: Vec<BlockDescriptor>,
        packdata: Vec<u8>,
        expected_sequence: u64,
    ) -> GnsResult<Entry> {
        self.require(path, caller, Right::Write).await?;
        Self::enforce_plain_packing(path, packing)?;
        let entry = Entry {
            name: path.canonical(),
            signed_name,
            packing,
            time,
            blocks,
            packdata,
            writer,
            link: String::new(),
            attr,
            sequence: 0,
        };
        let result = self.handle_for(&path.user).put(path.clone(), entry, expected_sequence).await?;
        self.invalidate_if_governing(path);
        Ok(result)
    }

    pub async fn make_directory(&self, caller: &UserName, path: &PathName, writer: [u8; 32], packing: Packing) -> GnsResult<Entry> {
        self.require(path, caller, Right::Create).await?;
        self.handle_for(&path.user).make_directory(path.clone(), writer, packing).await
    }

    pub async fn make_root(&self, user: &UserName, writer: [u8; 32]) -> GnsResult<Entry> {
        self.handle_for(user).make_root(writer).await
    }

    pub async fn delete(&self, caller: &UserName, path: &PathName) -> GnsResult<()> {
        self.require(path, caller, Right::Delete).await?;
        self.handle_for(&path.user).delete(path.clone()).await?;
        self.invalidate_if_governing(path);
        Ok(())
    }

    pub async fn which_access(&self, path: &PathName) -> GnsResult<Option<PathName>> {
        self.access.which_access(path).await.map_err(|e| GnsError::internal(e.to_string()))
    }

    /// Any write under a user's tree can change which Access file governs
    /// descendants, so the resolver's memoized lookups for that subtree are
    /// dropped unconditionally rather than parsed for relevance.
    fn invalidate_if_governing(&self, path: &PathName) {
        self.access.invalidate(path);
        if let Some(parent) = path.parent() {
            self.access.invalidate(&parent);
        }
    }
}
