use super::{Reader, ensure_len};
use crate::error::{ParseError, ParseResult};

pub const PERFORMANCE_METRICS_LEN: usize = 28;

/// Periodic device performance report.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PerformanceMetrics {
    pub fps:                f32,
    pub inference_time_ms:  u32,
    pub cpu_usage_percent:  f32,
    pub memory_usage_bytes: u32,
    pub frame_count:        u32,
    pub detection_count:    u32,
    pub recognition_count:  u32,
}

impl PerformanceMetrics {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PERFORMANCE_METRICS_LEN);
        out.extend_from_slice(&self.fps.to_le_bytes());
        out.extend_from_slice(&self.inference_time_ms.to_le_bytes());
        out.extend_from_slice(&self.cpu_usage_percent.to_le_bytes());
        out.extend_from_slice(&self.memory_usage_bytes.to_le_bytes());
        out.extend_from_slice(&self.frame_count.to_le_bytes());
        out.extend_from_slice(&self.detection_count.to_le_bytes());
        out.extend_from_slice(&self.recognition_count.to_le_bytes());
        out
    }
}

impl TryFrom<&[u8]> for PerformanceMetrics {
    type Error = ParseError;

    fn try_from(body: &[u8]) -> ParseResult<Self> {
        ensure_len(body, PERFORMANCE_METRICS_LEN)?;

        let mut r = Reader::new(body);
        Ok(Self {
            fps:                r.f32()?,
            inference_time_ms:  r.u32()?,
            cpu_usage_percent:  r.f32()?,
            memory_usage_bytes: r.u32()?,
            frame_count:        r.u32()?,
            detection_count:    r.u32()?,
            recognition_count:  r.u32()?,
        })
    }
}

impl std::fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1} fps | inference {} ms | cpu {:.1}% | mem {} KiB | frames {} | det {} | rec {}",
            self.fps,
            self.inference_time_ms,
            self.cpu_usage_percent,
            self.memory_usage_bytes / 1024,
            self.frame_count,
            self.detection_count,
            self.recognition_count,
        )
    }
}
