use super::{Reader, ensure_len};
use crate::error::{EncodeError, ParseError, ParseResult};

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Detections
// —————————————————————————————————————————————————————————————————————————————————————————————————

pub const MAX_DETECTIONS: usize = 100;
pub const MAX_KEYPOINTS: usize = 64;

/// [FRAME_ID:4][COUNT:4]
const RESULTS_HEADER_LEN: usize = 8;
/// [CLASS:4][X:4][Y:4][W:4][H:4][CONF:4][KP_COUNT:4]
const DETECTION_FIXED_LEN: usize = 28;
const KEYPOINT_LEN: usize = 8;

/// One detected object, coordinates normalized to 0..1.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Detection {
    pub class_id:   u32,
    /// Box center
    pub x:          f32,
    pub y:          f32,
    pub width:      f32,
    pub height:     f32,
    pub confidence: f32,
    /// (x, y) pairs
    pub keypoints:  Vec<(f32, f32)>,
}

impl Detection {
    /// Box corners (x0, y0, x1, y1) scaled to an image of `img_w` x `img_h` pixels.
    pub fn to_pixels(&self, img_w: u32, img_h: u32) -> (i32, i32, i32, i32) {
        let (w, h) = (img_w as f32, img_h as f32);
        let x0 = (self.x - self.width / 2.0) * w;
        let y0 = (self.y - self.height / 2.0) * h;
        let x1 = (self.x + self.width / 2.0) * w;
        let y1 = (self.y + self.height / 2.0) * h;
        (x0 as i32, y0 as i32, x1 as i32, y1 as i32)
    }

    fn read(r: &mut Reader<'_>) -> ParseResult<Self> {
        let class_id = r.u32()?;
        let x = r.f32()?;
        let y = r.f32()?;
        let width = r.f32()?;
        let height = r.f32()?;
        let confidence = r.f32()?;

        let kp_count = r.u32()? as usize;
        if kp_count > MAX_KEYPOINTS {
            return Err(ParseError::CountTooLarge {
                field: "keypoint",
                count: kp_count,
                max:   MAX_KEYPOINTS,
            });
        }

        let mut keypoints = Vec::with_capacity(kp_count);
        for _ in 0..kp_count {
            keypoints.push((r.f32()?, r.f32()?));
        }

        Ok(Self {
            class_id,
            x,
            y,
            width,
            height,
            confidence,
            keypoints,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.class_id.to_le_bytes());
        for v in [self.x, self.y, self.width, self.height, self.confidence] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&(self.keypoints.len() as u32).to_le_bytes());
        for (kx, ky) in &self.keypoints {
            out.extend_from_slice(&kx.to_le_bytes());
            out.extend_from_slice(&ky.to_le_bytes());
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DetectionResults {
    pub frame_id:   u32,
    pub detections: Vec<Detection>,
}

impl DetectionResults {
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.detections.len() > MAX_DETECTIONS {
            return Err(EncodeError::CountTooLarge {
                field: "detection",
                count: self.detections.len(),
                max:   MAX_DETECTIONS,
            });
        }

        let mut size = RESULTS_HEADER_LEN;
        for det in &self.detections {
            if det.keypoints.len() > MAX_KEYPOINTS {
                return Err(EncodeError::CountTooLarge {
                    field: "keypoint",
                    count: det.keypoints.len(),
                    max:   MAX_KEYPOINTS,
                });
            }
            size += DETECTION_FIXED_LEN + det.keypoints.len() * KEYPOINT_LEN;
        }

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&self.frame_id.to_le_bytes());
        out.extend_from_slice(&(self.detections.len() as u32).to_le_bytes());
        for det in &self.detections {
            det.write(&mut out);
        }
        Ok(out)
    }
}

impl TryFrom<&[u8]> for DetectionResults {
    type Error = ParseError;

    fn try_from(body: &[u8]) -> ParseResult<Self> {
        ensure_len(body, RESULTS_HEADER_LEN)?;

        let mut r = Reader::new(body);
        let frame_id = r.u32()?;
        let count = r.u32()? as usize;

        if count > MAX_DETECTIONS {
            return Err(ParseError::CountTooLarge {
                field: "detection",
                count,
                max: MAX_DETECTIONS,
            });
        }

        // Cheap reject before allocating for a count the body cannot hold
        let needed = RESULTS_HEADER_LEN + count * DETECTION_FIXED_LEN;
        if body.len() < needed {
            return Err(ParseError::Truncated {
                needed,
                got: body.len(),
            });
        }

        let mut detections = Vec::with_capacity(count);
        for _ in 0..count {
            detections.push(Detection::read(&mut r)?);
        }

        Ok(Self {
            frame_id,
            detections,
        })
    }
}
