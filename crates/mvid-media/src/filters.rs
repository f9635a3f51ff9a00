//! FFmpeg filter construction for assembly passes.

use mvid_models::NEUTRAL_ADJUSTMENT;

/// Fade length at both ends of the assembled video, in seconds.
pub const FADE_SECONDS: f64 = 1.0;

/// Build the `eq` filter for brightness/contrast sliders.
///
/// Sliders are 0-100 with 50 neutral. Brightness maps to the signed
/// -1.0..+1.0 range, contrast to 0.0..2.0. Returns `None` at the neutral
/// midpoint so the adjustment pass can be skipped entirely.
pub fn eq_filter(brightness: u8, contrast: u8) -> Option<String> {
    if brightness == NEUTRAL_ADJUSTMENT && contrast == NEUTRAL_ADJUSTMENT {
        return None;
    }
    let b = (f64::from(brightness) - 50.0) / 50.0;
    let c = 1.0 + (f64::from(contrast) - 50.0) / 50.0;
    Some(format!("eq=brightness={b:.3}:contrast={c:.3}"))
}

/// Build the fade filter: 1 s fade-in at 0 and a 1 s fade-out ending at
/// `total_duration`.
pub fn fade_filter(total_duration: f64) -> String {
    let out_start = (total_duration - FADE_SECONDS).max(0.0);
    format!(
        "fade=t=in:st=0:d={FADE_SECONDS},fade=t=out:st={out_start:.3}:d={FADE_SECONDS}"
    )
}

/// Build the scale-preserving-aspect-ratio + pad filter for normalizing a
/// clip to `width`x`height` (letterbox/pillarbox, centered).
pub fn normalize_filter(width: u32, height: u32) -> String {
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"
    )
}

/// Build the filter_complex trimming the second input's audio to
/// `video_duration` and resetting its timestamps.
pub fn audio_trim_filter(video_duration: f64) -> String {
    format!("[1:a]atrim=0:{video_duration:.3},asetpts=PTS-STARTPTS[aout]")
}
