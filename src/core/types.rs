use serde::{Deserialize, Serialize};

/// Nucleotide alphabet in k-mer code order (A=0, C=1, G=2, U=3)
pub const NUCLEOTIDES: [char; 4] = ['A', 'C', 'G', 'U'];

/// Largest k-mer length the index accepts (4^7 buckets per transcript)
pub const MAX_KMER_LENGTH: usize = 7;

/// Length of the seed region (g2-g8)
pub const SEED_LENGTH: usize = 7;

/// Length of the supplementary region (g13-g17)
pub const SUPP_LENGTH: usize = 5;

/// 0-based guide index of g12
pub const G12_INDEX: usize = 11;

/// 0-based guide index where the supplementary region starts (g13)
pub const SUPP_START: usize = 12;

/// 0-based guide index just past the seed region (g9)
pub const SEED_END: usize = 8;

/// Shortest bridge that still holds the central A-box plus one bulged base
pub const DEFAULT_MIN_BRIDGE: usize = 4;

/// Canonical guide length
pub const DEFAULT_GUIDE_LENGTH: usize = 21;

/// Target window used by coupling and design-only analyses (31-nt MRE)
pub const TARGET_WINDOW: usize = 31;

/// Transcript sub-region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionTag {
    /// 5' untranslated region
    Utr5,
    /// Coding sequence
    Cds,
    /// 3' untranslated region
    Utr3,
}

impl RegionTag {
    /// Tags in transcript order (5' to 3')
    pub const ALL: [RegionTag; 3] = [RegionTag::Utr5, RegionTag::Cds, RegionTag::Utr3];

    fn bit(self) -> u8 {
        match self {
            Self::Utr5 => 0b001,
            Self::Cds => 0b010,
            Self::Utr3 => 0b100,
        }
    }
}

impl std::fmt::Display for RegionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utr5 => write!(f, "5'UTR"),
            Self::Cds => write!(f, "CDS"),
            Self::Utr3 => write!(f, "3'UTR"),
        }
    }
}

/// Set of transcript sub-regions an index or window may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<RegionTag>", into = "Vec<RegionTag>")]
pub struct RegionMask(u8);

impl RegionMask {
    pub const UTR5: RegionMask = RegionMask(0b001);
    pub const CDS: RegionMask = RegionMask(0b010);
    pub const UTR3: RegionMask = RegionMask(0b100);
    pub const ALL: RegionMask = RegionMask(0b111);

    #[must_use]
    pub fn contains(self, tag: RegionTag) -> bool {
        self.0 & tag.bit() != 0
    }

    #[must_use]
    pub fn union(self, other: RegionMask) -> RegionMask {
        RegionMask(self.0 | other.0)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Tags in this mask, 5' to 3'
    pub fn tags(self) -> impl Iterator<Item = RegionTag> {
        RegionTag::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl Default for RegionMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<RegionTag> for RegionMask {
    fn from(tag: RegionTag) -> Self {
        RegionMask(tag.bit())
    }
}

impl From<Vec<RegionTag>> for RegionMask {
    fn from(tags: Vec<RegionTag>) -> Self {
        tags.into_iter()
            .fold(RegionMask(0), |mask, tag| mask.union(tag.into()))
    }
}

impl From<RegionMask> for Vec<RegionTag> {
    fn from(mask: RegionMask) -> Self {
        mask.tags().collect()
    }
}

impl std::str::FromStr for RegionMask {
    type Err = String;

    /// Parse a comma-separated region list, e.g. `utr3` or `cds,utr3` or `all`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = RegionMask(0);
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let tag = match part.to_lowercase().as_str() {
                "all" => return Ok(Self::ALL),
                "utr5" | "5utr" | "5'utr" => RegionTag::Utr5,
                "cds" => RegionTag::Cds,
                "utr3" | "3utr" | "3'utr" => RegionTag::Utr3,
                other => return Err(format!("unknown region '{other}'")),
            };
            mask = mask.union(tag.into());
        }
        if mask.is_empty() {
            return Err("empty region list".to_string());
        }
        Ok(mask)
    }
}

impl std::fmt::Display for RegionMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.tags().map(|t| t.to_string()).collect();
        write!(f, "{}", names.join("+"))
    }
}

/// Groups every occurrence of one ordered anchor pair across all transcripts.
///
/// Rendered as `kmer3p/kmer5p`. The halves are held separately so nothing has
/// to split the rendered key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct GripKey {
    kmer3p: String,
    kmer5p: String,
}

impl GripKey {
    pub fn new(kmer3p: impl Into<String>, kmer5p: impl Into<String>) -> Self {
        Self {
            kmer3p: kmer3p.into(),
            kmer5p: kmer5p.into(),
        }
    }

    /// Anchor facing the seed (3' side of the target site)
    pub fn kmer3p(&self) -> &str {
        &self.kmer3p
    }

    /// Anchor facing the supplementary region (5' side of the target site)
    pub fn kmer5p(&self) -> &str {
        &self.kmer5p
    }
}

impl std::fmt::Display for GripKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kmer3p, self.kmer5p)
    }
}

impl From<GripKey> for String {
    fn from(key: GripKey) -> Self {
        key.to_string()
    }
}

/// Unique guide identifier, rendered `root.reference`.
///
/// Construction rules:
/// - grip-derived guides: root `kmer3p/kmer5p[transcript.pos3p.pos5p]`
/// - cross-hybridized guides: root `<parent id>[transcript.g2.g12]`
/// - extension passes keep the parent's root and take a fresh reference number
///
/// Ids are display/debug keys. Lineage is never recovered by parsing them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct GuideId {
    root: String,
    reference: u64,
}

impl GuideId {
    pub fn new(root: impl Into<String>, reference: u64) -> Self {
        Self {
            root: root.into(),
            reference,
        }
    }

    /// Root for a guide designed directly on a grip occurrence
    pub fn grip_root(grip: &GripKey, transcript: &str, pos3p: usize, pos5p: usize) -> String {
        format!("{grip}[{transcript}.{pos3p}.{pos5p}]")
    }

    /// Root for a guide carrying `parent`'s sequence onto another location
    pub fn cross_root(parent: &GuideId, transcript: &str, g2: usize, g12: usize) -> String {
        format!("{parent}[{transcript}.{g2}.{g12}]")
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn reference(&self) -> u64 {
        self.reference
    }
}

impl std::fmt::Display for GuideId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.root, self.reference)
    }
}

impl From<GuideId> for String {
    fn from(id: GuideId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_mask_parse() {
        assert_eq!("utr3".parse::<RegionMask>().unwrap(), RegionMask::UTR3);
        assert_eq!(
            "cds, utr3".parse::<RegionMask>().unwrap(),
            RegionMask::CDS.union(RegionMask::UTR3)
        );
        assert_eq!("all".parse::<RegionMask>().unwrap(), RegionMask::ALL);
        assert!("intron".parse::<RegionMask>().is_err());
        assert!("".parse::<RegionMask>().is_err());
    }

    #[test]
    fn test_region_mask_serde() {
        let mask = RegionMask::UTR5.union(RegionMask::UTR3);
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, r#"["utr5","utr3"]"#);
        let back: RegionMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_grip_key_display() {
        let key = GripKey::new("AACG", "GGUUA");
        assert_eq!(key.to_string(), "AACG/GGUUA");
        assert_eq!(key.kmer3p(), "AACG");
        assert_eq!(key.kmer5p(), "GGUUA");
    }

    #[test]
    fn test_guide_id_lineage() {
        let key = GripKey::new("AACG", "GGUUA");
        let parent = GuideId::new(GuideId::grip_root(&key, "tx1", 30, 10), 0);
        assert_eq!(parent.to_string(), "AACG/GGUUA[tx1.30.10].0");

        let sibling = GuideId::new(parent.root(), 7);
        assert_eq!(sibling.to_string(), "AACG/GGUUA[tx1.30.10].7");

        let cross = GuideId::new(GuideId::cross_root(&parent, "tx2", 50, 36), 8);
        assert_eq!(cross.to_string(), "AACG/GGUUA[tx1.30.10].0[tx2.50.36].8");
    }
}
