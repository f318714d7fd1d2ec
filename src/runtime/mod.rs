//! Container runtime layer
//!
//! All build stages execute through the `ContainerRuntime` trait; the
//! production implementation drives the Docker CLI.

mod container;
mod docker;

pub use container::{
    BindMount, ContainerRuntime, ExecOutput, ExecSpec, ImageBuild, VolumeInfo, VolumeMount,
};
pub use docker::DockerRuntime;

/// Create the container runtime used for pipeline execution
pub fn create_runtime() -> Box<dyn ContainerRuntime> {
    Box::new(DockerRuntime::new())
}

#[cfg(test)]
pub mod testing {
    //! Recording runtime for stage and coordinator tests

    use super::*;
    use crate::error::{PipelineError, PipelineResult};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// In-memory runtime that records every operation
    #[derive(Default)]
    pub struct RecordingRuntime {
        /// Operation log, in call order
        pub events: Mutex<Vec<String>>,
        /// Scripted exec results, popped per call (default: success, empty)
        pub exec_outputs: Mutex<VecDeque<ExecOutput>>,
        /// Image tag that build_image should fail on
        pub fail_build_on: Option<String>,
        /// Reference that push_image should fail on
        pub fail_push_on: Option<String>,
        volumes: Mutex<HashMap<String, HashMap<String, String>>>,
    }

    impl RecordingRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_exec_outputs(outputs: Vec<ExecOutput>) -> Self {
            Self {
                exec_outputs: Mutex::new(outputs.into()),
                ..Self::default()
            }
        }

        pub fn with_fail_build_on(mut self, tag: impl Into<String>) -> Self {
            self.fail_build_on = Some(tag.into());
            self
        }

        pub fn with_fail_push_on(mut self, reference: impl Into<String>) -> Self {
            self.fail_push_on = Some(reference.into());
            self
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl ContainerRuntime for RecordingRuntime {
        async fn is_available(&self) -> PipelineResult<bool> {
            Ok(true)
        }

        async fn ensure_ready(&self) -> PipelineResult<()> {
            Ok(())
        }

        async fn exec(&self, spec: &ExecSpec) -> PipelineResult<ExecOutput> {
            self.record(format!("exec:{}", spec.command.join(" ")));
            Ok(self
                .exec_outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ExecOutput {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                }))
        }

        async fn build_image(&self, build: &ImageBuild) -> PipelineResult<()> {
            self.record(format!("build:{}", build.tag));
            if self.fail_build_on.as_deref() == Some(build.tag.as_str()) {
                return Err(PipelineError::ImageBuild {
                    image: build.tag.clone(),
                    reason: "injected failure".to_string(),
                });
            }
            Ok(())
        }

        async fn tag_image(&self, source: &str, reference: &str) -> PipelineResult<()> {
            self.record(format!("tag:{source}->{reference}"));
            Ok(())
        }

        async fn push_image(&self, reference: &str) -> PipelineResult<()> {
            self.record(format!("push:{reference}"));
            if self.fail_push_on.as_deref() == Some(reference) {
                return Err(PipelineError::ImagePush {
                    reference: reference.to_string(),
                    reason: "injected failure".to_string(),
                });
            }
            Ok(())
        }

        async fn volume_inspect(&self, name: &str) -> PipelineResult<Option<VolumeInfo>> {
            Ok(self
                .volumes
                .lock()
                .unwrap()
                .get(name)
                .map(|labels| VolumeInfo {
                    name: name.to_string(),
                    labels: labels.clone(),
                }))
        }

        async fn volume_create(
            &self,
            name: &str,
            labels: &HashMap<String, String>,
        ) -> PipelineResult<()> {
            self.record(format!("volume_create:{name}"));
            self.volumes
                .lock()
                .unwrap()
                .insert(name.to_string(), labels.clone());
            Ok(())
        }

        async fn volume_list(&self, prefix: &str) -> PipelineResult<Vec<VolumeInfo>> {
            Ok(self
                .volumes
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name.starts_with(prefix))
                .map(|(name, labels)| VolumeInfo {
                    name: name.clone(),
                    labels: labels.clone(),
                })
                .collect())
        }

        async fn volume_remove(&self, name: &str) -> PipelineResult<()> {
            self.record(format!("volume_remove:{name}"));
            self.volumes.lock().unwrap().remove(name);
            Ok(())
        }

        fn runtime_name(&self) -> &'static str {
            "recording"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_runtime_is_docker() {
        let runtime = create_runtime();
        assert_eq!(runtime.runtime_name(), "Docker");
    }
}
