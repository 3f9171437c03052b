//! Bounded parallel transcription of split recordings.

use crate::error::{ProcessError, ProcessResult};
use crate::ffmpeg::AudioSegment;
use crate::transcribe::TranscriptSegment;
use rayon::prelude::*;
use tracing::debug;

/// Transcribe `segments` on a pool of `workers` threads and reassemble the
/// result in chronological order.
///
/// Timestamps returned by `transcribe` are relative to each segment and are
/// shifted by the segment's start offset. Any failed segment fails the whole
/// recording.
pub fn transcribe_segments<F>(
    segments: &[AudioSegment],
    workers: usize,
    transcribe: F,
) -> ProcessResult<Vec<TranscriptSegment>>
where
    F: Fn(&AudioSegment) -> ProcessResult<Vec<TranscriptSegment>> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| ProcessError::Pool(e.to_string()))?;

    debug!("Transcribing {} segments on {} workers", segments.len(), workers.max(1));

    let mut parts: Vec<(f64, Vec<TranscriptSegment>)> = pool.install(|| {
        segments
            .par_iter()
            .map(|segment| {
                let transcript = transcribe(segment)?;
                Ok((segment.start_offset, transcript))
            })
            .collect::<ProcessResult<Vec<_>>>()
    })?;

    parts.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(parts
        .into_iter()
        .flat_map(|(offset, transcript)| transcript.into_iter().map(move |s| s.shifted(offset)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn segment(index: usize) -> AudioSegment {
        AudioSegment {
            path: PathBuf::from(format!("/tmp/seg_{}.wav", index)),
            start_offset: index as f64 * 600.0,
        }
    }

    #[test]
    fn test_reassembles_by_offset() {
        let segments: Vec<_> = (0..4).map(segment).collect();

        // Earlier segments finish last.
        let result = transcribe_segments(&segments, 4, |seg| {
            let index = (seg.start_offset / 600.0) as u64;
            std::thread::sleep(Duration::from_millis(40 - index * 10));
            Ok(vec![TranscriptSegment {
                text: format!("part {}", index),
                start: 1.0,
                end: 2.0,
            }])
        })
        .unwrap();

        let texts: Vec<_> = result.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["part 0", "part 1", "part 2", "part 3"]);
        assert_eq!(result[2].start, 1201.0);
    }

    #[test]
    fn test_bounded_workers() {
        let segments: Vec<_> = (0..6).map(segment).collect();
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        transcribe_segments(&segments, 2, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![])
        })
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_one_failure_fails_recording() {
        let segments: Vec<_> = (0..3).map(segment).collect();
        let result = transcribe_segments(&segments, 2, |seg| {
            if seg.start_offset == 600.0 {
                Err(ProcessError::TranscriptionError("bad audio".to_string()))
            } else {
                Ok(vec![])
            }
        });
        assert!(matches!(result, Err(ProcessError::TranscriptionError(_))));
    }
}
