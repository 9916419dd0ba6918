use std::fmt;

use serde::{Deserialize, Serialize};

/// The two upload categories produced by the upstream deconvolution tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Deconvolved,
    Annotated,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Deconvolved, Bucket::Annotated];

    /// Filename suffix that routes an upload into this bucket.
    pub fn suffix(self) -> &'static str {
        match self {
            Bucket::Deconvolved => "_deconv.mzML",
            Bucket::Annotated => "_annotated.mzML",
        }
    }

    /// Subdirectory of a workspace holding this bucket's raw files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Bucket::Deconvolved => "deconv-mzMLs",
            Bucket::Annotated => "anno-mzMLs",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Deconvolved => "deconvolved",
            Bucket::Annotated => "annotated",
        }
    }

    /// The bucket holding the other half of a pair.
    pub fn partner(self) -> Bucket {
        match self {
            Bucket::Deconvolved => Bucket::Annotated,
            Bucket::Annotated => Bucket::Deconvolved,
        }
    }

    /// Filename an experiment's file in this bucket is expected to have.
    pub fn file_name_for(self, experiment: &str) -> String {
        format!("{}{}", experiment, self.suffix())
    }

    pub fn classify(name: &str) -> Option<Bucket> {
        Bucket::ALL
            .into_iter()
            .find(|bucket| name.ends_with(bucket.suffix()))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
