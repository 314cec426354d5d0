use crate::{edge::locate_edge, Aoi, Config, EdgeLine, Frame, Result};

/// AOI and edge after re-centering
#[derive(Debug, Clone)]
pub struct RefinedAoi {
    pub aoi: Aoi,
    pub line: EdgeLine,
    /// Number of AOI moves
    pub moves: usize,
}

/// New AOI center in frame coordinates, `None` if the AOI center is already
/// within `tolerance` pixels of the edge
pub fn recenter(aoi: &Aoi, line: &EdgeLine, tolerance: f64) -> Option<[f64; 2]> {
    let d = line.signed_distance(aoi.center());
    if d.abs() <= tolerance {
        return None;
    }
    let [nx, ny] = line.normal();
    let [cx, cy] = aoi.frame_center();
    Some([cx - d * nx, cy - d * ny])
}

/// Crops the AOI centered on `center` and applies the pixel cleaning step
pub fn prepare_aoi(frame: &Frame, center: [f64; 2], config: &Config) -> Result<Aoi> {
    let aoi = frame.crop(center, config.aoi_size)?;
    Ok(if config.bad_pixel_remove {
        aoi.remove_bad_pixels(config.bad_pixel_factor)
    } else {
        aoi
    })
}

/// Locates the edge in the AOI centered on `center`, moving the AOI onto the
/// edge at most `refine_iterations` times if `dynamic_aoi` is set
pub fn refine_aoi(frame: &Frame, center: [f64; 2], config: &Config) -> Result<RefinedAoi> {
    config.validate()?;
    let mut aoi = prepare_aoi(frame, center, config)?;
    let mut line = locate_edge(&aoi)?;
    let mut moves = 0;
    if config.dynamic_aoi {
        for _ in 0..config.refine_iterations {
            let Some(new_center) = recenter(&aoi, &line, config.refine_tolerance_px) else {
                break;
            };
            log::debug!(
                "moving AOI center from {:?} to {:?}",
                aoi.frame_center(),
                new_center
            );
            aoi = prepare_aoi(frame, new_center, config)?;
            line = locate_edge(&aoi)?;
            moves += 1;
        }
    }
    Ok(RefinedAoi { aoi, line, moves })
}
