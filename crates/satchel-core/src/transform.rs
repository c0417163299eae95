//! Content transform pipelines.
//!
//! A [`Pipeline`] is an ordered list of asynchronous [`Transform`] steps.
//! Steps run strictly left to right: step `i + 1` sees exactly what step
//! `i` returned. An empty pipeline is the identity.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Position metadata handed to every transform step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformContext<'a> {
    /// Path or URL of the member being transformed; `None` for the
    /// whole-artifact post-minify stage.
    pub source: Option<&'a str>,
    /// Index of the member in the resolved file list.
    pub index: usize,
    /// Whether this is the last member of the group.
    pub last: bool,
}

impl TransformContext<'static> {
    /// Context used for the post-minify stage.
    pub const WHOLE: TransformContext<'static> = TransformContext {
        source: None,
        index: 0,
        last: true,
    };
}

/// A single content-rewriting step.
///
/// Implementations may suspend (e.g. to call an external service) but must
/// always produce the content to hand to the next step.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Rewrites `content`.
    async fn apply(&self, content: String, cx: &TransformContext<'_>) -> String;
}

/// Adapts a synchronous closure into a [`Transform`].
pub struct FnTransform<F>(F);

impl<F> FnTransform<F>
where
    F: Fn(String, &TransformContext<'_>) -> String + Send + Sync + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Transform for FnTransform<F>
where
    F: Fn(String, &TransformContext<'_>) -> String + Send + Sync + 'static,
{
    async fn apply(&self, content: String, cx: &TransformContext<'_>) -> String {
        (self.0)(content, cx)
    }
}

/// An ordered sequence of transforms.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn Transform>>,
}

impl Pipeline {
    /// Creates an empty (identity) pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline with one step.
    pub fn single(step: impl Transform + 'static) -> Self {
        Self::new().then(step)
    }

    /// Creates a pipeline from a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(String, &TransformContext<'_>) -> String + Send + Sync + 'static,
    {
        Self::single(FnTransform::new(f))
    }

    /// Appends a step.
    pub fn then(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Appends an already shared step.
    pub fn then_shared(mut self, step: Arc<dyn Transform>) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order.
    pub async fn run(&self, content: String, cx: &TransformContext<'_>) -> String {
        let mut content = content;
        for step in &self.steps {
            content = step.apply(content, cx).await;
        }
        content
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Pipelines keyed by user-agent pattern, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Manipulations {
    entries: Vec<(String, Pipeline)>,
}

impl Manipulations {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipeline for `user_agent`, replacing any previous one
    /// while keeping its original position.
    pub fn insert(&mut self, user_agent: impl Into<String>, pipeline: Pipeline) {
        let key = user_agent.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = pipeline,
            None => self.entries.push((key, pipeline)),
        }
    }

    /// Returns the pipeline configured for exactly this variant key.
    pub fn get(&self, user_agent: &str) -> Option<&Pipeline> {
        self.entries
            .iter()
            .find(|(k, _)| k == user_agent)
            .map(|(_, p)| p)
    }

    /// Returns the configured keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns true if nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Delayed(&'static str);

    #[async_trait]
    impl Transform for Delayed {
        async fn apply(&self, content: String, _cx: &TransformContext<'_>) -> String {
            tokio::time::sleep(Duration::from_millis(5)).await;
            format!("{content}{}", self.0)
        }
    }

    fn cx() -> TransformContext<'static> {
        TransformContext {
            source: Some("a.js"),
            index: 0,
            last: true,
        }
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_identity() {
        let out = Pipeline::new().run("abc".to_string(), &cx()).await;
        assert_eq!(out, "abc");
    }

    #[tokio::test]
    async fn test_steps_run_left_to_right() {
        let pipeline = Pipeline::single(Delayed("1"))
            .then(FnTransform::new(|c: String, _: &TransformContext<'_>| c + "2"))
            .then(Delayed("3"));
        assert_eq!(pipeline.len(), 3);

        let out = pipeline.run("x".to_string(), &cx()).await;
        assert_eq!(out, "x123");
    }

    #[tokio::test]
    async fn test_context_is_passed_through() {
        let pipeline = Pipeline::from_fn(|c, cx| {
            format!("{c}:{}:{}:{}", cx.source.unwrap_or("-"), cx.index, cx.last)
        });
        let out = pipeline
            .run(
                "v".to_string(),
                &TransformContext {
                    source: Some("lib/b.js"),
                    index: 2,
                    last: false,
                },
            )
            .await;
        assert_eq!(out, "v:lib/b.js:2:false");

        let out = pipeline.run("v".to_string(), &TransformContext::WHOLE).await;
        assert_eq!(out, "v:-:0:true");
    }

    #[test]
    fn test_manipulations_keep_declaration_order() {
        let mut m = Manipulations::new();
        m.insert("MSIE", Pipeline::new());
        m.insert("Firefox", Pipeline::new());
        m.insert("MSIE", Pipeline::from_fn(|c, _| c));

        let keys: Vec<_> = m.keys().collect();
        assert_eq!(keys, vec!["MSIE", "Firefox"]);
        assert_eq!(m.get("MSIE").map(Pipeline::len), Some(1));
        assert!(m.get("Chrome").is_none());
    }
}
