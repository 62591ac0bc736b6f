/// When and how an association is loaded relative to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchMode {
    pub timing: FetchTiming,
    pub style: FetchStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTiming {
    /// Loaded together with the owner.
    Immediate,

    /// Loaded on first access.
    Delayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStyle {
    /// Joined into the owner's select.
    Join,

    /// Loaded by a separate (possibly batched) select.
    Select,
}

impl FetchMode {
    pub const EAGER_JOIN: FetchMode = FetchMode {
        timing: FetchTiming::Immediate,
        style: FetchStyle::Join,
    };

    pub const EAGER_SELECT: FetchMode = FetchMode {
        timing: FetchTiming::Immediate,
        style: FetchStyle::Select,
    };

    pub const LAZY: FetchMode = FetchMode {
        timing: FetchTiming::Delayed,
        style: FetchStyle::Select,
    };

    pub fn is_join(self) -> bool {
        self.timing == FetchTiming::Immediate && self.style == FetchStyle::Join
    }

    pub fn is_lazy(self) -> bool {
        self.timing == FetchTiming::Delayed
    }
}

/// Operations propagated from an owner to an association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cascade {
    pub persist: bool,
    pub remove: bool,
}

impl Cascade {
    pub const NONE: Cascade = Cascade {
        persist: false,
        remove: false,
    };

    pub const ALL: Cascade = Cascade {
        persist: true,
        remove: true,
    };
}
