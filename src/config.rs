//! Compiler configuration

/// How SQL placeholders are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BindStyle {
    /// `?` markers with a parallel ordered value list
    #[default]
    Positional,
    /// The dialect's numbered marker (`$1`, `?1`, `@p1`)
    Numbered,
}

/// Configuration shared by every backend compiler
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CompilerConfig {
    /// Page size used when neither `limit` nor `pageSize` is given
    pub default_page_size: u64,
    /// Larger page sizes are clamped to this
    pub max_page_size: u64,
    /// Maximum number of relationship hops in a dotted path
    pub max_relationship_depth: u8,
    pub bind_style: BindStyle,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 1000,
            max_relationship_depth: 5,
            bind_style: BindStyle::Positional,
        }
    }
}

impl CompilerConfig {
    pub fn with_bind_style(mut self, bind_style: BindStyle) -> Self {
        self.bind_style = bind_style;
        self
    }

    pub fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }
}
