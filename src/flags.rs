use bitflags::bitflags;

bitflags! {
    /// Behavioural modifiers attached to a cache handle or a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Flags: u64 {
        /// Mutations do not take the key's lock stripe.
        const SKIP_LOCKING = 0b00000001;
        /// Mutations do not notify listeners.
        const SKIP_LISTENER_NOTIFICATION = 0b00000010;
        /// Entry iteration is for a bulk/remote transfer and never removes.
        const REMOTE_ITERATION = 0b00000100;
    }
}

impl Flags {
    /// Whether any bit of `mask` is set.
    #[inline]
    pub fn contains_any(self, mask: Flags) -> bool {
        self.intersects(mask)
    }
}
