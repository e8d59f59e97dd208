use serde_json::Value;

/// One row of the label density table.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelDensityTier {
    /// The tier applies while the zoom factor is strictly below this bound.
    pub zoom_upper_bound: f64,
    pub rank_cutoff: u32,
    pub label_cap: usize,
}

impl LabelDensityTier {
    pub const fn new(zoom_upper_bound: f64, rank_cutoff: u32, label_cap: usize) -> Self {
        Self {
            zoom_upper_bound,
            rank_cutoff,
            label_cap,
        }
    }
}

/// The tier picked for a zoom factor, with its position in the table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TierSelection {
    pub index: usize,
    pub rank_cutoff: u32,
    pub label_cap: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelTableError {
    Empty,
    /// Upper bounds must be strictly increasing and not NaN.
    UnorderedBounds { index: usize },
    /// Rank cutoff and label cap must not shrink as the zoom grows.
    DecreasingDensity { index: usize },
}

impl std::fmt::Display for LabelTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelTableError::Empty => write!(f, "label density table is empty"),
            LabelTableError::UnorderedBounds { index } => {
                write!(f, "tier {index}: zoom bound is not above the previous tier")
            }
            LabelTableError::DecreasingDensity { index } => {
                write!(f, "tier {index}: rank cutoff or label cap decreases")
            }
        }
    }
}

impl std::error::Error for LabelTableError {}

/// Maps a continuous zoom factor onto an ordered table of label tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDensityPolicy {
    tiers: Vec<LabelDensityTier>,
}

impl Default for LabelDensityPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                LabelDensityTier::new(1.5, 1, 8),
                LabelDensityTier::new(3.0, 2, 20),
                LabelDensityTier::new(6.0, 3, 40),
                LabelDensityTier::new(12.0, 4, 80),
                LabelDensityTier::new(f64::INFINITY, 5, 150),
            ],
        }
    }
}

impl LabelDensityPolicy {
    pub fn new(tiers: Vec<LabelDensityTier>) -> Result<Self, LabelTableError> {
        if tiers.is_empty() {
            return Err(LabelTableError::Empty);
        }
        if tiers[0].zoom_upper_bound.is_nan() {
            return Err(LabelTableError::UnorderedBounds { index: 0 });
        }
        for (i, pair) in tiers.windows(2).enumerate() {
            let (prev, next) = (pair[0], pair[1]);
            if next.zoom_upper_bound.is_nan() || next.zoom_upper_bound <= prev.zoom_upper_bound {
                return Err(LabelTableError::UnorderedBounds { index: i + 1 });
            }
            if next.rank_cutoff < prev.rank_cutoff || next.label_cap < prev.label_cap {
                return Err(LabelTableError::DecreasingDensity { index: i + 1 });
            }
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[LabelDensityTier] {
        &self.tiers
    }

    /// First tier whose upper bound exceeds `zoom_factor`, else the last one.
    pub fn select_tier(&self, zoom_factor: f64) -> TierSelection {
        let last = self.tiers.len() - 1;
        let index = self
            .tiers
            .iter()
            .position(|t| zoom_factor < t.zoom_upper_bound)
            .unwrap_or(last);
        self.selection(index)
    }

    /// The sparsest tier; used before the camera has reported a zoom.
    pub fn first_tier(&self) -> TierSelection {
        self.selection(0)
    }

    fn selection(&self, index: usize) -> TierSelection {
        let tier = self.tiers[index];
        TierSelection {
            index,
            rank_cutoff: tier.rank_cutoff,
            label_cap: tier.label_cap,
        }
    }
}

/// Remembers the applied tier and reports only real tier changes.
#[derive(Debug, Clone)]
pub struct LabelDensityTracker {
    policy: LabelDensityPolicy,
    applied: Option<TierSelection>,
}

impl LabelDensityTracker {
    pub fn new(policy: LabelDensityPolicy) -> Self {
        Self {
            policy,
            applied: None,
        }
    }

    pub fn policy(&self) -> &LabelDensityPolicy {
        &self.policy
    }

    pub fn applied(&self) -> Option<TierSelection> {
        self.applied
    }

    /// The applied tier, or the sparsest one if nothing was applied yet.
    pub fn current(&self) -> TierSelection {
        self.applied.unwrap_or_else(|| self.policy.first_tier())
    }

    /// Re-evaluates the policy; returns the new tier only if it differs from
    /// the one applied before.
    pub fn update(&mut self, zoom_factor: f64) -> Option<TierSelection> {
        let selected = self.policy.select_tier(zoom_factor);
        if self.applied == Some(selected) {
            return None;
        }
        self.applied = Some(selected);
        Some(selected)
    }
}

/// Reads a numeric rank from feature properties. Absent or non-numeric ranks
/// fall back to `default_rank`.
pub fn rank_of(value: Option<&Value>, default_rank: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default_rank),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default_rank),
        _ => default_rank,
    }
}
