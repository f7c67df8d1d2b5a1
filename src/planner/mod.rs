//! Update planning: full reinstall or patch chain.
//!
//! Given the installed build and the build the user should be on, the planner
//! decides whether to reinstall the full package, do nothing, or walk a chain
//! of binary patches. Patch availability comes from a [`PatchIndex`].
//!
//! # Chain resolution
//!
//! The origin stores a sparse graph of patches: build `d` may be reachable
//! from some set of earlier builds. The planner chains backwards from the
//! target:
//!
//! 1. Ask the index which builds patch directly to `target`.
//! 2. If the installed build is among them, the chain is `[target]`.
//! 3. Otherwise pick the lowest source that lies strictly between the
//!    installed build and `target`, and resolve a chain to that waypoint.
//! 4. The result is the waypoint chain followed by `target`.
//!
//! Choosing the lowest waypoint favours long hops. Only one waypoint is tried
//! per level: if it turns out to be unreachable the whole resolution fails
//! rather than backtracking through the other candidates. The waypoint is
//! always strictly lower than the level before it, so resolution performs at
//! most `target - current` index queries.
//!
//! # Example
//!
//! With the listings `13 ← {9, 12}` and `12 ← {8, 10}`, resolving from 10 to
//! 13 queries 13, picks waypoint 12, queries 12, finds 10, and returns
//! `[12, 13]`.

use crate::index::PatchIndex;
use anyhow::Result;
use std::fmt;
use tracing::{debug, info};

/// Ordered list of builds to patch through, ending at the destination.
///
/// Always non-empty and strictly increasing. Each element is reached by
/// applying the patch from the previous element (or from the installed build,
/// for the first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan(Vec<u32>);

impl PatchPlan {
    /// Builds visited, in application order.
    #[must_use]
    pub fn hops(&self) -> &[u32] {
        &self.0
    }

    /// Number of patches to apply.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; provided for API symmetry with [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Final build of the chain.
    #[must_use]
    pub fn destination(&self) -> u32 {
        self.0.last().copied().unwrap_or_default()
    }

    /// `(source, destination)` pairs starting from `current`.
    pub fn steps(&self, current: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        std::iter::once(current).chain(self.0.iter().copied()).zip(self.0.iter().copied())
    }
}

impl fmt::Display for PatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&hops.join(" → "))
    }
}

/// What the update session should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDecision {
    /// The installed build is already the desired one.
    UpToDate,
    /// Install the full package of this build.
    FullReinstall(u32),
    /// Apply these patches in order.
    PatchChain(PatchPlan),
    /// No chain of patches leads to the desired build.
    Unreachable,
}

impl fmt::Display for PlanDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("up to date"),
            Self::FullReinstall(version) => write!(f, "full reinstall of build {version}"),
            Self::PatchChain(plan) => write!(f, "patch chain {plan}"),
            Self::Unreachable => f.write_str("no patch path"),
        }
    }
}

/// Chooses between reinstalling and patching.
pub struct UpdatePlanner<'a, I: PatchIndex + ?Sized> {
    index: &'a I,
}

impl<'a, I: PatchIndex + ?Sized> UpdatePlanner<'a, I> {
    /// Planner querying `index` for patch availability.
    pub const fn new(index: &'a I) -> Self {
        Self {
            index,
        }
    }

    /// Decide how to get from `current` to `desired`.
    ///
    /// An install from a different origin, or one newer than requested, is
    /// replaced with the `stable` build; patches only run forwards. Matching
    /// versions need no index query at all.
    ///
    /// # Errors
    ///
    /// Propagates index failures (network, malformed listing).
    pub async fn plan(
        &self,
        current: u32,
        desired: u32,
        origin: &str,
        expected_origin: &str,
        stable: u32,
    ) -> Result<PlanDecision> {
        if origin != expected_origin {
            info!("Installed build came from '{}', reinstalling from '{}'", origin, expected_origin);
            return Ok(PlanDecision::FullReinstall(stable));
        }
        if current > desired {
            info!("Installed build {} is newer than requested {}, reinstalling", current, desired);
            return Ok(PlanDecision::FullReinstall(stable));
        }
        if current == desired {
            return Ok(PlanDecision::UpToDate);
        }

        Ok(match self.resolve(current, desired).await? {
            Some(plan) => PlanDecision::PatchChain(plan),
            None => PlanDecision::Unreachable,
        })
    }

    /// Resolve a patch chain from `current` to `target`.
    ///
    /// Returns `Ok(None)` when no chain exists under the lowest-waypoint rule.
    ///
    /// # Errors
    ///
    /// Propagates index failures; a failed query aborts the whole resolution.
    pub async fn resolve(&self, current: u32, target: u32) -> Result<Option<PatchPlan>> {
        if current >= target {
            return Ok(None);
        }

        // Targets still to be reached, highest first.
        let mut pending = Vec::new();
        let mut target = target;

        loop {
            let sources = self.index.list_sources(target).await?;
            debug!("Resolving {} → {}: sources {:?}", current, target, sources);

            if sources.contains(&current) {
                let mut hops = vec![target];
                hops.extend(pending.into_iter().rev());
                let plan = PatchPlan(hops);
                debug!("Resolved chain {}", plan);
                return Ok(Some(plan));
            }

            // Sources at or above their own destination are malformed.
            let Some(waypoint) = sources.range(current.saturating_add(1)..target).next().copied() else {
                debug!("No patch leads from {} towards {}", current, target);
                return Ok(None);
            };

            pending.push(target);
            target = waypoint;
        }
    }
}

impl<I: PatchIndex + ?Sized> fmt::Debug for UpdatePlanner<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatePlanner").finish_non_exhaustive()
    }
}
