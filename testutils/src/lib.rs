//! Utilities used in tests in multiple crates within the workspace.

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use googletest::{
    description::Description,
    matcher::{Matcher, MatcherBase, MatcherResult},
};

/// Matches an [anyhow::Error] whose chain holds an error of type `E` that satisfies `inner`.
/// Errors wrapped in context are found as well as bare ones.
pub fn anyhow_downcasts_to<E, M>(inner: M) -> ErrorInChain<E, M> {
    ErrorInChain {
        inner,
        error_type: PhantomData,
    }
}

pub struct ErrorInChain<E, M> {
    inner: M,
    error_type: PhantomData<E>,
}

impl<E: std::error::Error + 'static, M> ErrorInChain<E, M> {
    fn find<'e>(actual: &'e anyhow::Error) -> Option<&'e E> {
        actual.chain().find_map(|cause| cause.downcast_ref::<E>())
    }
}

impl<E, M> MatcherBase for ErrorInChain<E, M> {}

impl<E, M> Matcher<&anyhow::Error> for ErrorInChain<E, M>
where
    E: std::error::Error + Copy + Send + Sync + 'static,
    M: Matcher<E>,
{
    fn matches(&self, actual: &anyhow::Error) -> MatcherResult {
        match Self::find(actual) {
            Some(found) => self.inner.matches(*found),
            None => MatcherResult::NoMatch,
        }
    }

    fn explain_match(&self, actual: &anyhow::Error) -> Description {
        let type_name = std::any::type_name::<E>();
        match Self::find(actual) {
            Some(found) => Description::new()
                .text(format!("which holds a {} that", type_name))
                .nested(self.inner.explain_match(*found)),
            None => Description::new().text(format!(
                "which holds no {} in its chain: {:#}",
                type_name, actual
            )),
        }
    }

    fn describe(&self, matcher_result: MatcherResult) -> Description {
        let holds = match matcher_result {
            MatcherResult::Match => "holds",
            MatcherResult::NoMatch => "does not hold",
        };
        format!(
            "{} a {} that {}",
            holds,
            std::any::type_name::<E>(),
            self.inner.describe(MatcherResult::Match)
        )
        .into()
    }
}

/// Writes `contents` to a file called `name` within `dir`, returning its path.
pub fn write_fixture(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("writing fixture {:?}", path))?;
    Ok(path)
}

/// Creates a temporary directory for fixture files, removed when dropped.
pub fn fixture_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir().context("creating fixture directory")
}
