// Sat Oct 17 2026 - Alex

//! Sample geometry jobs used by the command line demo.

use crate::engine::{CancellationToken, Progress, Task, TaskError};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type PointCloud = Arc<[Point3]>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn min(self, other: Point3) -> Point3 {
        Point3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    fn max(self, other: Point3) -> Point3 {
        Point3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    fn of_point(p: Point3) -> Self {
        Self { min: p, max: p }
    }

    fn merge(self, other: BoundingBox) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn extent(&self) -> Point3 {
        Point3::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }

    pub fn volume(&self) -> f64 {
        let e = self.extent();
        e.x * e.y * e.z
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeshSummary {
    pub chunks_done: usize,
    pub vertices: usize,
    pub triangles: usize,
}

/// Deterministic pseudo-random cloud inside the unit cube.
pub fn generate_point_cloud(count: usize, seed: u64) -> PointCloud {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };

    (0..count)
        .map(|_| {
            let x = next();
            let y = next();
            let z = next();
            Point3::new(x, y, z)
        })
        .collect()
}

const BOUNDS_BATCHES: usize = 16;

pub fn compute_bounding_box(
    points: &[Point3],
    token: &CancellationToken,
    progress: &Progress<BoundingBox>,
) -> Result<BoundingBox, TaskError> {
    if points.is_empty() {
        return Err(TaskError::InvalidInput("point cloud is empty".to_string()));
    }

    let batch_len = points.len().div_ceil(BOUNDS_BATCHES);
    let mut bounds: Option<BoundingBox> = None;

    for (i, batch) in points.chunks(batch_len).enumerate() {
        token.check()?;

        let batch_bounds = batch
            .par_iter()
            .map(|p| BoundingBox::of_point(*p))
            .reduce_with(BoundingBox::merge);

        bounds = match (bounds, batch_bounds) {
            (Some(acc), Some(b)) => Some(acc.merge(b)),
            (acc, b) => acc.or(b),
        };

        progress.report_fraction((i + 1) * batch_len, points.len(), "scanning points");
    }

    bounds.ok_or_else(|| TaskError::execution("no bounds computed"))
}

pub fn build_mesh(
    points: &[Point3],
    chunks: usize,
    token: &CancellationToken,
    progress: &Progress<MeshSummary>,
) -> Result<MeshSummary, TaskError> {
    if points.len() < 3 {
        return Err(TaskError::InvalidInput(format!(
            "need at least 3 points to mesh, got {}",
            points.len()
        )));
    }

    let chunk_len = points.len().div_ceil(chunks.max(1));
    let total_chunks = points.len().div_ceil(chunk_len);
    let mut summary = MeshSummary::default();

    for chunk in points.chunks(chunk_len) {
        token.check()?;

        // Triangle strip over each chunk, skipping degenerate triangles.
        let triangles = chunk
            .par_windows(3)
            .filter(|w| triangle_area(w[0], w[1], w[2]) > f64::EPSILON)
            .count();

        summary.chunks_done += 1;
        summary.vertices += chunk.len();
        summary.triangles += triangles;

        progress.partial(summary);
        progress.report_fraction(summary.chunks_done, total_chunks, "meshing chunk");
    }

    Ok(summary)
}

fn triangle_area(a: Point3, b: Point3, c: Point3) -> f64 {
    let ab = Point3::new(b.x - a.x, b.y - a.y, b.z - a.z);
    let ac = Point3::new(c.x - a.x, c.y - a.y, c.z - a.z);
    let cross = Point3::new(
        ab.y * ac.z - ab.z * ac.y,
        ab.z * ac.x - ab.x * ac.z,
        ab.x * ac.y - ab.y * ac.x,
    );
    0.5 * (cross.x * cross.x + cross.y * cross.y + cross.z * cross.z).sqrt()
}

/// Sleeps `steps` times, polling the token between steps.
pub fn slow_count(steps: u32, step_delay: Duration, token: &CancellationToken, progress: &Progress<u32>) -> Result<u32, TaskError> {
    for step in 0..steps {
        token.check()?;
        thread::sleep(step_delay);
        progress.report_fraction(step as usize + 1, steps as usize, "waiting");
    }
    Ok(steps)
}

pub fn bounding_box_task(id: &str, points: PointCloud) -> Task<PointCloud, BoundingBox> {
    Task::new(id, points, |points: PointCloud, token, progress| {
        compute_bounding_box(&points, token, progress)
    })
}

pub fn mesh_task(id: &str, points: PointCloud, chunks: usize) -> Task<PointCloud, MeshSummary> {
    Task::new(id, points, move |points: PointCloud, token, progress| {
        build_mesh(&points, chunks, token, progress)
    })
}

pub fn slow_task(id: &str, steps: u32, step_delay: Duration) -> Task<u32, u32> {
    Task::new(id, steps, move |steps, token, progress| slow_count(steps, step_delay, token, progress))
}
