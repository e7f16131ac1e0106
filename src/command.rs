//! Visitable read commands.
//!
//! Commands are plain values dispatched through a [`Visitor`]. A visitor
//! standing in for an interceptor may adjust a command (for instance its
//! flags) before performing it; commands therefore read their flags when
//! performed, not when built.

use std::fmt::Display;

use crate::cache::{Cache, Key, LockOwner, Value};
use crate::error::Result;
use crate::flags::Flags;
use crate::view::EntryView;

/// Per-invocation state handed to commands.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    lock_owner: Option<LockOwner>,
    origin_local: bool,
}

impl InvocationContext {
    /// A locally originated context without a lock owner.
    pub fn new() -> Self {
        Self {
            lock_owner: None,
            origin_local: true,
        }
    }

    /// A context for an invocation that arrived from another node.
    pub fn remote() -> Self {
        Self {
            lock_owner: None,
            origin_local: false,
        }
    }

    /// Attribute the invocation to `owner`.
    pub fn with_lock_owner(mut self, owner: LockOwner) -> Self {
        self.lock_owner = Some(owner);
        self
    }

    /// Set or clear the lock owner.
    pub fn set_lock_owner(&mut self, owner: Option<LockOwner>) {
        self.lock_owner = owner;
    }

    /// Owner the invocation is attributed to.
    pub fn lock_owner(&self) -> Option<LockOwner> {
        self.lock_owner
    }

    /// Whether the invocation originated on this node.
    pub fn is_origin_local(&self) -> bool {
        self.origin_local
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// How a command wants missing entries to be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadType {
    /// Never load.
    DontLoad,
    /// Load on the primary owner only.
    Primary,
    /// Load on any owner.
    Owner,
}

/// Produces a live [`EntryView`] over a cache.
pub struct EntrySetCommand<K, V> {
    cache: Cache<K, V>,
    flags: Flags,
}

impl<K: Key, V: Value> EntrySetCommand<K, V> {
    /// Create a command over `cache`. Non-empty `flags` are also applied to
    /// the cache handle the view will use.
    pub fn new(cache: Cache<K, V>, flags: Flags) -> Self {
        let cache = if flags.is_empty() {
            cache
        } else {
            cache.with_flags(flags)
        };
        Self { cache, flags }
    }

    /// Current flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Replace the flags.
    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    /// Add to the flags.
    pub fn add_flags(&mut self, flags: Flags) {
        self.flags |= flags;
    }

    /// The target cache handle.
    pub fn cache(&self) -> &Cache<K, V> {
        &self.cache
    }

    /// Build the view.
    ///
    /// Remote iteration is decided from the flags as they are now. If `ctx`
    /// carries a lock owner, the view works through a handle bound to it.
    pub fn perform(&self, ctx: &InvocationContext) -> Result<EntryView<K, V>> {
        let remote_iteration = self.flags.contains_any(Flags::REMOTE_ITERATION);
        let cache = match ctx.lock_owner() {
            Some(owner) => self.cache.lock_as(owner)?,
            None => self.cache.clone(),
        };

        tracing::debug!(
            "[command]: entry set on {} (remote iteration: {}, owner: {:?})",
            cache.name(),
            remote_iteration,
            cache.lock_owner()
        );
        Ok(EntryView::new(cache, remote_iteration))
    }

    /// # Panics
    ///
    /// Always. Entry-set commands never load entries, so asking is a bug.
    pub fn load_type(&self) -> LoadType {
        panic!("{} has no load type", self);
    }

    /// Dispatch to `visitor`.
    pub fn accept_visitor<T>(
        &mut self,
        ctx: &InvocationContext,
        visitor: &mut T,
    ) -> Result<CommandResult<K, V>>
    where
        T: Visitor<K, V> + ?Sized,
    {
        visitor.visit_entry_set_command(ctx, self)
    }
}

impl<K: Key, V: Value> Display for EntrySetCommand<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntrySetCommand{{cache={}}}", self.cache.name())
    }
}

/// Reports the live number of entries.
pub struct SizeCommand<K, V> {
    cache: Cache<K, V>,
    flags: Flags,
}

impl<K: Key, V: Value> SizeCommand<K, V> {
    /// Create a command over `cache`.
    pub fn new(cache: Cache<K, V>, flags: Flags) -> Self {
        Self { cache, flags }
    }

    /// Current flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Replace the flags.
    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    /// Count the entries.
    pub fn perform(&self, _ctx: &InvocationContext) -> usize {
        self.cache.size()
    }

    /// Size never loads.
    pub fn load_type(&self) -> LoadType {
        LoadType::DontLoad
    }

    /// Dispatch to `visitor`.
    pub fn accept_visitor<T>(
        &mut self,
        ctx: &InvocationContext,
        visitor: &mut T,
    ) -> Result<CommandResult<K, V>>
    where
        T: Visitor<K, V> + ?Sized,
    {
        visitor.visit_size_command(ctx, self)
    }
}

impl<K: Key, V: Value> Display for SizeCommand<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SizeCommand{{cache={}}}", self.cache.name())
    }
}

/// Outcome of performing a [`Command`].
#[derive(Debug)]
pub enum CommandResult<K, V> {
    /// From [`EntrySetCommand`].
    EntrySet(EntryView<K, V>),
    /// From [`SizeCommand`].
    Size(usize),
}

impl<K, V> CommandResult<K, V> {
    /// The entry view, if this came from an entry-set command.
    pub fn into_entry_set(self) -> Option<EntryView<K, V>> {
        match self {
            CommandResult::EntrySet(view) => Some(view),
            _ => None,
        }
    }

    /// The size, if this came from a size command.
    pub fn into_size(self) -> Option<usize> {
        match self {
            CommandResult::Size(size) => Some(size),
            _ => None,
        }
    }
}

/// Per-command handlers. The default methods perform the command.
pub trait Visitor<K: Key, V: Value> {
    /// Handle an [`EntrySetCommand`].
    fn visit_entry_set_command(
        &mut self,
        ctx: &InvocationContext,
        command: &mut EntrySetCommand<K, V>,
    ) -> Result<CommandResult<K, V>> {
        command.perform(ctx).map(CommandResult::EntrySet)
    }

    /// Handle a [`SizeCommand`].
    fn visit_size_command(
        &mut self,
        ctx: &InvocationContext,
        command: &mut SizeCommand<K, V>,
    ) -> Result<CommandResult<K, V>> {
        Ok(CommandResult::Size(command.perform(ctx)))
    }
}

/// Visitor that performs every command unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Performer;

impl<K: Key, V: Value> Visitor<K, V> for Performer {}

/// Any read command.
pub enum Command<K, V> {
    /// See [`EntrySetCommand`].
    EntrySet(EntrySetCommand<K, V>),
    /// See [`SizeCommand`].
    Size(SizeCommand<K, V>),
}

impl<K: Key, V: Value> Command<K, V> {
    /// Dispatch to the visitor method for this command's kind.
    pub fn accept_visitor<T>(
        &mut self,
        ctx: &InvocationContext,
        visitor: &mut T,
    ) -> Result<CommandResult<K, V>>
    where
        T: Visitor<K, V> + ?Sized,
    {
        match self {
            Command::EntrySet(command) => command.accept_visitor(ctx, visitor),
            Command::Size(command) => command.accept_visitor(ctx, visitor),
        }
    }

    /// Current flags of the wrapped command.
    pub fn flags(&self) -> Flags {
        match self {
            Command::EntrySet(command) => command.flags(),
            Command::Size(command) => command.flags(),
        }
    }
}

impl<K: Key, V: Value> Display for Command<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::EntrySet(command) => command.fmt(f),
            Command::Size(command) => command.fmt(f),
        }
    }
}
