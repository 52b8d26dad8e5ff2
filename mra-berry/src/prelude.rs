//! 涵盖了本 crate 一系列常用功能的预导入模块.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{Plane, PlaneMut, Resolution, SegMask, Volume};

pub use crate::cancel::CancelToken;
pub use crate::error::{Result, VesselError};

pub use crate::centerline::{
    find_centerlines, Centerline, CenterlineConfig, CenterlineGraph, CenterlineNode, CostVariant,
};
pub use crate::cluster::{label_clusters, threshold_clusters, Cluster};
pub use crate::dfe::{
    distance_from_edge, modify_dfe, threshold_under, DistanceVolume, VoxelDistance,
};
pub use crate::graph::{build_graphs, Connectivity, Graph, GraphNode, GraphValue};
pub use crate::pc::PhaseContrast;
pub use crate::segment::{segment, SegmentConfig, Segmentation};
pub use crate::tortuosity::{score, score_graph, TortuosityRecord};

pub use crate::consts::{gray, DISTANCE_PRECISION};
