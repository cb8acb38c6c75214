//! Physical normalization of samples.
//!
//! MC and signal samples are rescaled by
//! `cross_section × branching_ratio × luminosity / generated_events`,
//! times the global and per-sample user scales. Data is never rescaled.

use sp_core::{Error, Result};

use crate::config::Configuration;
use crate::sample::{Sample, SampleKind};

/// Compute the normalization factor for `sample`. Data always gets 1.
///
/// A sample declaring zero generated events is a configuration problem
/// and must be reported before any scaling happens; letting it through
/// would silently propagate infinities into the stack.
pub fn scale_factor(config: &Configuration, sample: &Sample) -> Result<f64> {
    if sample.kind() == SampleKind::Data {
        return Ok(1.0);
    }

    let spec = &sample.spec;
    if spec.generated_events == 0.0 {
        return Err(Error::Computation(format!(
            "sample '{}' declares zero generated events",
            spec.path
        )));
    }

    let mut factor = spec.cross_section * spec.branching_ratio / spec.generated_events;

    if !config.no_lumi_rescaling {
        factor *= config.luminosity_for(&spec.era)?;
    }

    if !config.ignore_scales {
        factor *= config.scale * spec.scale;
    }

    Ok(factor)
}

/// Rescale a sample's nominal series and every attached systematic shape
/// in place. Returns the factor that was applied.
pub fn rescale_sample(config: &Configuration, sample: &mut Sample) -> Result<f64> {
    let factor = scale_factor(config, sample)?;

    if sample.kind() == SampleKind::Data {
        return Ok(factor);
    }

    sample.nominal.scale(factor);

    for syst in &mut sample.systematics {
        if let Some(shape) = syst.nominal_shape.as_mut() {
            shape.scale(factor);
        }
        if let Some(shape) = syst.up_shape.as_mut() {
            shape.scale(factor);
        }
        if let Some(shape) = syst.down_shape.as_mut() {
            shape.scale(factor);
        }
    }

    tracing::debug!(
        sample = %sample.spec.path,
        cross_section = sample.spec.cross_section,
        branching_ratio = sample.spec.branching_ratio,
        generated_events = sample.spec.generated_events,
        factor,
        "rescaled sample"
    );

    Ok(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleSpec;
    use approx::assert_abs_diff_eq;
    use sp_core::BinnedSeries;

    fn mc_sample() -> Sample {
        let nominal =
            BinnedSeries::from_parts(vec![0.0, 1.0, 2.0], vec![4.0, 6.0], vec![4.0, 6.0]).unwrap();
        Sample::new(SampleSpec::new("mc.root", SampleKind::Mc), nominal)
    }

    fn config_with_lumi(lumi: f64) -> Configuration {
        let mut config = Configuration::default();
        config.luminosity.insert(String::new(), lumi);
        config
    }

    #[test]
    fn unit_factor_leaves_sample_unchanged() {
        let config = config_with_lumi(1.0);
        let mut sample = mc_sample();
        let before = sample.nominal.clone();
        let factor = rescale_sample(&config, &mut sample).unwrap();
        assert_abs_diff_eq!(factor, 1.0);
        assert_eq!(sample.nominal, before);
    }

    #[test]
    fn factor_combines_xsec_lumi_and_scales() {
        let mut config = config_with_lumi(2000.0);
        config.scale = 2.0;
        let mut sample = mc_sample();
        sample.spec.cross_section = 10.0;
        sample.spec.branching_ratio = 0.5;
        sample.spec.generated_events = 1000.0;
        sample.spec.scale = 3.0;

        // 10 * 0.5 / 1000 * 2000 * 2 * 3
        let factor = scale_factor(&config, &sample).unwrap();
        assert_abs_diff_eq!(factor, 60.0);

        config.ignore_scales = true;
        let factor = scale_factor(&config, &sample).unwrap();
        assert_abs_diff_eq!(factor, 10.0);
    }

    #[test]
    fn variance_scales_quadratically() {
        let config = config_with_lumi(1.0);
        let mut sample = mc_sample();
        sample.spec.cross_section = 2.0;
        rescale_sample(&config, &mut sample).unwrap();
        assert_abs_diff_eq!(sample.nominal.content[0], 8.0);
        assert_abs_diff_eq!(sample.nominal.variance[0], 16.0);
    }

    #[test]
    fn zero_generated_events_is_fatal_to_the_plot() {
        let config = config_with_lumi(1.0);
        let mut sample = mc_sample();
        sample.spec.generated_events = 0.0;
        assert!(scale_factor(&config, &sample).is_err());
    }

    #[test]
    fn data_is_never_rescaled() {
        let config = Configuration::default();
        let nominal =
            BinnedSeries::from_parts(vec![0.0, 1.0], vec![7.0], vec![7.0]).unwrap();
        let mut sample = Sample::new(SampleSpec::new("data.root", SampleKind::Data), nominal);
        sample.spec.cross_section = 100.0;
        let factor = rescale_sample(&config, &mut sample).unwrap();
        assert_abs_diff_eq!(factor, 1.0);
        assert_abs_diff_eq!(sample.nominal.content[0], 7.0);
    }
}
