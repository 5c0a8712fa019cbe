//! wormshape: worm shape geometry and image-based shape detection (sans-IO).
//!
//! Describes a worm by a center line with a width profile and converts
//! between the representations used when tracking it:
//!
//! center line <-> turning angles ([`theta`]) ->
//! left/right sides ([`shape`]) -> center line and width ([`midline`]).
//!
//! [`detect_shape`] finds the body in a grayscale frame through:
//! blur -> threshold -> contour tracing -> contour selection ->
//! head/tail localization -> side split -> midline.
//!
//! [`WormModel`] wraps a center line and width with the deformations,
//! occlusion and contour distance queries used to fit a model to
//! successive frames.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! images and point sequences and returns structured data. Decoding
//! encoded frames is available through [`grayscale::decode_frame`] for
//! callers that hold raw bytes.

pub mod blur;
pub mod contour;
pub mod curve;
pub mod detect;
pub mod diagnostics;
pub mod grayscale;
pub mod head_tail;
pub mod matching;
pub mod midline;
pub mod model;
pub mod moments;
pub mod occlusion;
pub mod peaks;
pub mod shape;
pub mod spline;
pub mod theta;
pub mod threshold;
pub mod types;

pub use contour::{ContourTracer, ContourTracerKind};
pub use detect::{
    ContourSelection, DetectionHints, DetectionOutcome, DetectionResult, DetectionStatus,
    DetectorConfig, ThresholdPass, detect_shape, detect_shape_with_diagnostics,
};
pub use diagnostics::DetectionDiagnostics;
pub use head_tail::HeadTailResolution;
pub use matching::{ContourDistances, DistanceOptions, distance_shape_to_contour};
pub use midline::{Midline, MidlineExtractor, MidlineMethod, MidlineOptions};
pub use model::{Measurement, ModelConfig, Transform, WormModel};
pub use occlusion::{Occlusions, self_occlusions};
pub use shape::{ShapePair, shape_from_center, shape_from_theta};
pub use theta::{ThetaMapping, ThetaMethod, ThetaState};
pub use threshold::Polarity;
pub use types::{Curve, Dimensions, GrayImage, InputError, Point, ShapeError};
