use crate::model::ClassSig;
use kiln_classfile::flags::{ACC_BRIDGE, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ACC_SYNTHETIC};

/// Member visibility, ordered from most to least restrictive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    PackagePrivate,
    Protected,
    Public,
}

impl Visibility {
    pub fn of(access: u16) -> Self {
        if access & ACC_PUBLIC != 0 {
            Visibility::Public
        } else if access & ACC_PROTECTED != 0 {
            Visibility::Protected
        } else if access & ACC_PRIVATE != 0 {
            Visibility::Private
        } else {
            Visibility::PackagePrivate
        }
    }
}

/// Which members count towards the ABI.
///
/// Extraction always captures everything; this filter is applied as a
/// separate post-step so different consumers (compile avoidance, API export)
/// can disagree about what "the API" is without re-parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberPolicy {
    pub min_visibility: Visibility,
    /// Keep compiler-generated (`ACC_SYNTHETIC`/`ACC_BRIDGE`) members.
    /// Including them is conservative: bridge generation is deterministic for
    /// identical inputs, so it costs spurious rebuilds only when the compiler
    /// itself changes its output.
    pub include_synthetic: bool,
}

impl MemberPolicy {
    /// Every member, synthetic or not. The compile-avoidance default.
    pub fn everything() -> Self {
        Self {
            min_visibility: Visibility::Private,
            include_synthetic: true,
        }
    }

    /// Only members visible outside the compilation unit, excluding
    /// compiler-generated ones. Suitable for published-API views.
    pub fn public_surface() -> Self {
        Self {
            min_visibility: Visibility::Protected,
            include_synthetic: false,
        }
    }

    pub fn retains(&self, access: u16) -> bool {
        if Visibility::of(access) < self.min_visibility {
            return false;
        }
        self.include_synthetic || access & (ACC_SYNTHETIC | ACC_BRIDGE) == 0
    }
}

impl Default for MemberPolicy {
    fn default() -> Self {
        Self::everything()
    }
}

impl ClassSig {
    /// Returns a copy with members the policy rejects removed.
    pub fn retain(&self, policy: MemberPolicy) -> ClassSig {
        let mut out = self.clone();
        out.fields.retain(|f| policy.retains(f.access));
        out.methods.retain(|m| policy.retains(m.access));
        out
    }
}
