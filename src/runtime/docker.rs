//! Docker CLI container runtime
//!
//! Implements the ContainerRuntime trait by shelling out to the Docker CLI.
//! Every stage execution is a one-shot `docker run --rm` with declared
//! mounts and environment, awaited to completion.

use crate::error::{PipelineError, PipelineResult};
use crate::runtime::container::{
    ContainerRuntime, ExecOutput, ExecSpec, ImageBuild, VolumeInfo,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Container runtime using the Docker CLI
pub struct DockerRuntime;

impl DockerRuntime {
    /// Create a new Docker runtime
    pub fn new() -> Self {
        Self
    }

    /// Check if Docker is installed
    async fn docker_installed() -> bool {
        Command::new("docker")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Check if the daemon is reachable
    async fn daemon_reachable(&self) -> PipelineResult<bool> {
        let output = self.exec_raw(&["info", "--format", "{{.ServerVersion}}"]).await?;
        Ok(output.status.success())
    }

    /// Execute a Docker command and return the raw output
    async fn exec_raw(&self, args: &[&str]) -> PipelineResult<std::process::Output> {
        debug!("Executing: docker {:?}", args);

        Command::new("docker")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::command_failed(format!("docker {:?}", args), e))
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn is_available(&self) -> PipelineResult<bool> {
        if !Self::docker_installed().await {
            return Ok(false);
        }
        self.daemon_reachable().await
    }

    async fn ensure_ready(&self) -> PipelineResult<()> {
        if !Self::docker_installed().await {
            return Err(PipelineError::DockerNotFound);
        }
        if !self.daemon_reachable().await? {
            return Err(PipelineError::DockerNotRunning);
        }
        Ok(())
    }

    async fn exec(&self, spec: &ExecSpec) -> PipelineResult<ExecOutput> {
        let mut args: Vec<String> = vec!["run".to_string(), "--rm".to_string()];

        args.push("-w".to_string());
        args.push(spec.workdir.clone());

        for bind in &spec.binds {
            args.push("-v".to_string());
            args.push(bind.mount_arg());
        }

        for volume in &spec.volumes {
            args.push("-v".to_string());
            args.push(volume.mount_arg());
        }

        for (k, v) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", k, v));
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());

        debug!("Running stage: docker {:?}", args);

        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.exec_raw(&args_refs).await?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn build_image(&self, build: &ImageBuild) -> PipelineResult<()> {
        info!("Building image: {}", build.tag);

        let dockerfile = build.dockerfile.display().to_string();
        let context = build.context.display().to_string();
        let output = self
            .exec_raw(&["build", "-f", &dockerfile, "-t", &build.tag, &context])
            .await?;

        // Classic builder prints steps on stdout, BuildKit on stderr
        for line in String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
        {
            if let Some((n, total, instruction)) = parse_build_step(line) {
                debug!("{}: step {}/{}: {}", build.tag, n, total, instruction);
            }
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PipelineError::ImageBuild {
                image: build.tag.clone(),
                reason: tail_lines(&stderr, 20),
            })
        }
    }

    async fn tag_image(&self, source: &str, reference: &str) -> PipelineResult<()> {
        let output = self.exec_raw(&["tag", source, reference]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PipelineError::ImagePush {
                reference: reference.to_string(),
                reason: stderr.into_owned(),
            })
        }
    }

    async fn push_image(&self, reference: &str) -> PipelineResult<()> {
        info!("Publishing: {}", reference);

        let output = self.exec_raw(&["push", reference]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PipelineError::ImagePush {
                reference: reference.to_string(),
                reason: tail_lines(&stderr, 10),
            })
        }
    }

    async fn volume_inspect(&self, name: &str) -> PipelineResult<Option<VolumeInfo>> {
        let output = self.exec_raw(&["volume", "inspect", name]).await?;

        if !output.status.success() {
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: serde_json::Value = serde_json::from_str(&stdout)?;

        let labels = parsed
            .get(0)
            .and_then(|v| v.get("Labels"))
            .and_then(|l| l.as_object())
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(VolumeInfo {
            name: name.to_string(),
            labels,
        }))
    }

    async fn volume_create(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> PipelineResult<()> {
        let mut args: Vec<String> = vec!["volume".to_string(), "create".to_string()];

        for (k, v) in labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", k, v));
        }
        args.push(name.to_string());

        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.exec_raw(&args_refs).await?;

        if output.status.success() {
            debug!("Created cache volume: {}", name);
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PipelineError::CacheVolumeCreate {
                name: name.to_string(),
                reason: stderr.into_owned(),
            })
        }
    }

    async fn volume_list(&self, prefix: &str) -> PipelineResult<Vec<VolumeInfo>> {
        let output = self
            .exec_raw(&["volume", "ls", "--format", "{{.Name}}"])
            .await?;
        if !output.status.success() {
            return Err(PipelineError::command_exec(
                "docker volume ls",
                String::from_utf8_lossy(&output.stderr),
            ));
        }

        let names: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| l.starts_with(prefix))
            .map(str::to_string)
            .collect();

        let mut volumes = Vec::with_capacity(names.len());
        for name in names {
            if let Some(info) = self.volume_inspect(&name).await? {
                volumes.push(info);
            }
        }

        Ok(volumes)
    }

    async fn volume_remove(&self, name: &str) -> PipelineResult<()> {
        let output = self.exec_raw(&["volume", "rm", name]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no such volume") {
                Ok(())
            } else {
                Err(PipelineError::command_exec("docker volume rm", stderr))
            }
        }
    }

    fn runtime_name(&self) -> &'static str {
        "Docker"
    }
}

/// Parse a classic-builder step line like `Step N/M : INSTRUCTION args...`
fn parse_build_step(line: &str) -> Option<(u64, u64, &str)> {
    let rest = line.strip_prefix("Step ")?;
    let slash = rest.find('/')?;
    let colon = rest.find(':')?;
    if colon <= slash {
        return None;
    }
    let n: u64 = rest[..slash].trim().parse().ok()?;
    let total: u64 = rest[slash + 1..colon].trim().parse().ok()?;
    let instruction = rest[colon + 1..].trim();
    Some((n, total, instruction))
}

/// Keep only the last `n` lines of noisy subprocess output
fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_runtime_name() {
        let runtime = DockerRuntime::new();
        assert_eq!(runtime.runtime_name(), "Docker");
    }

    #[test]
    fn parse_build_step_valid() {
        let (n, m, instr) = parse_build_step("Step 3/9 : RUN apt-get update").unwrap();
        assert_eq!(n, 3);
        assert_eq!(m, 9);
        assert_eq!(instr, "RUN apt-get update");
    }

    #[test]
    fn parse_build_step_from_line() {
        let (n, m, instr) = parse_build_step("Step 1/4 : FROM debian:bookworm-slim").unwrap();
        assert_eq!(n, 1);
        assert_eq!(m, 4);
        assert_eq!(instr, "FROM debian:bookworm-slim");
    }

    #[test]
    fn parse_build_step_not_a_step() {
        assert!(parse_build_step(" ---> abc123def").is_none());
        assert!(parse_build_step("Successfully built abc123").is_none());
        assert!(parse_build_step("").is_none());
    }

    #[test]
    fn tail_lines_truncates() {
        let text = "a\nb\nc\nd";
        assert_eq!(tail_lines(text, 2), "c\nd");
        assert_eq!(tail_lines(text, 10), "a\nb\nc\nd");
    }
}
