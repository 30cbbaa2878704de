//! Release policy for prompt processing outputs, per RFC-1134.

use super::policy::{DatasetTypePolicy, PolicyTable, RetentionPeriod};
use std::num::NonZeroU32;

pub const EMBARGO_PERIOD_HOURS: u32 = 80;

const TIER2_RETENTION_DAYS: NonZeroU32 = NonZeroU32::new(30).unwrap();
const TIER2_RETENTION: RetentionPeriod = RetentionPeriod::Days(TIER2_RETENTION_DAYS);

const PROVENANCE: DatasetTypePolicy = DatasetTypePolicy::new(0, true, RetentionPeriod::Forever);
const TIER1_PIXEL: DatasetTypePolicy =
    DatasetTypePolicy::new(EMBARGO_PERIOD_HOURS, true, RetentionPeriod::Forever);
const TIER1_NONPIXEL: DatasetTypePolicy = DatasetTypePolicy::new(0, true, RetentionPeriod::Forever);
const TIER2_PIXEL: DatasetTypePolicy =
    DatasetTypePolicy::new(EMBARGO_PERIOD_HOURS, true, TIER2_RETENTION);
const TIER2_NONPIXEL: DatasetTypePolicy = DatasetTypePolicy::new(0, true, TIER2_RETENTION);
const USDF_INTERNAL_NONPIXEL: DatasetTypePolicy = DatasetTypePolicy::new(0, false, TIER2_RETENTION);

const PROMPT_PROCESSING_OUTPUTS: &[(&str, DatasetTypePolicy)] = &[
    // Tier 1
    ("preliminary_visit_image", TIER1_PIXEL),
    ("preliminary_visit_image_background", TIER1_PIXEL),
    ("difference_kernel", TIER1_NONPIXEL),
    ("template_detector", TIER1_PIXEL),
    // Tier 2
    ("difference_image", TIER2_PIXEL),
    ("single_visit_star_footprints", TIER2_NONPIXEL),
    ("dia_source_apdb", TIER2_NONPIXEL),
    ("dia_forced_source_apdb", TIER2_NONPIXEL),
    ("dia_object_apdb", TIER2_NONPIXEL),
    ("marginal_new_dia_source", TIER2_NONPIXEL),
    ("ss_source_direct_detector", TIER2_NONPIXEL),
    ("ss_object_direct_unassociated", TIER2_NONPIXEL),
    ("ss_object_unassociated_detector", TIER2_NONPIXEL),
    ("ss_source_detector", TIER2_NONPIXEL),
    ("regionTimeInfo", TIER2_NONPIXEL),
    // Non-public
    ("dia_source_detector", USDF_INTERNAL_NONPIXEL),
    ("dia_source_schema", USDF_INTERNAL_NONPIXEL),
    ("dia_source_unfiltered", USDF_INTERNAL_NONPIXEL),
    ("new_dia_source", USDF_INTERNAL_NONPIXEL),
    ("preloaded_dia_forced_source", USDF_INTERNAL_NONPIXEL),
    ("preloaded_dia_object", USDF_INTERNAL_NONPIXEL),
    ("preloaded_dia_source", USDF_INTERNAL_NONPIXEL),
    ("preloaded_ss_object", USDF_INTERNAL_NONPIXEL),
    ("single_visit_star_schema", USDF_INTERNAL_NONPIXEL),
    // Miscellaneous provenance datasets (config/log/metadata/packages).
    ("analyzeAssociateDiaSourceTiming_config", PROVENANCE),
    ("analyzeAssociateDiaSourceTiming_log", PROVENANCE),
    ("analyzeAssociateDiaSourceTiming_metadata", PROVENANCE),
    ("analyzeAssociatedDiaSourceTable_config", PROVENANCE),
    ("analyzeAssociatedDiaSourceTable_log", PROVENANCE),
    ("analyzeAssociatedDiaSourceTable_metadata", PROVENANCE),
    ("analyzeAssociatedDirectSolarSystemObjectTable_config", PROVENANCE),
    ("analyzeAssociatedDirectSolarSystemObjectTable_log", PROVENANCE),
    ("analyzeAssociatedDirectSolarSystemObjectTable_metadata", PROVENANCE),
    ("analyzeDiaSourceAssociationMetrics_config", PROVENANCE),
    ("analyzeDiaSourceAssociationMetrics_log", PROVENANCE),
    ("analyzeDiaSourceAssociationMetrics_metadata", PROVENANCE),
    ("analyzeDiaSourceDetectionMetrics_config", PROVENANCE),
    ("analyzeDiaSourceDetectionMetrics_log", PROVENANCE),
    ("analyzeDiaSourceDetectionMetrics_metadata", PROVENANCE),
    ("analyzeImageDifferenceMetrics_config", PROVENANCE),
    ("analyzeImageDifferenceMetrics_log", PROVENANCE),
    ("analyzeImageDifferenceMetrics_metadata", PROVENANCE),
    ("analyzeLoadDiaCatalogsMetrics_config", PROVENANCE),
    ("analyzeLoadDiaCatalogsMetrics_log", PROVENANCE),
    ("analyzeLoadDiaCatalogsMetrics_metadata", PROVENANCE),
    ("analyzePreliminarySummaryStats_config", PROVENANCE),
    ("analyzePreliminarySummaryStats_log", PROVENANCE),
    ("analyzePreliminarySummaryStats_metadata", PROVENANCE),
    ("analyzeTrailedDiaSourceTable_config", PROVENANCE),
    ("analyzeTrailedDiaSourceTable_log", PROVENANCE),
    ("analyzeTrailedDiaSourceTable_metadata", PROVENANCE),
    ("analyzeUnassociatedDirectSolarSystemObjectTable_config", PROVENANCE),
    ("analyzeUnassociatedDirectSolarSystemObjectTable_log", PROVENANCE),
    ("analyzeUnassociatedDirectSolarSystemObjectTable_metadata", PROVENANCE),
    ("associateApdb_config", PROVENANCE),
    ("associateApdb_log", PROVENANCE),
    ("associateApdb_metadata", PROVENANCE),
    ("associateSolarSystemDirectSource_config", PROVENANCE),
    ("associateSolarSystemDirectSource_log", PROVENANCE),
    ("associateSolarSystemDirectSource_metadata", PROVENANCE),
    ("buildTemplate_config", PROVENANCE),
    ("buildTemplate_log", PROVENANCE),
    ("buildTemplate_metadata", PROVENANCE),
    ("calibrateImage_config", PROVENANCE),
    ("calibrateImage_log", PROVENANCE),
    ("calibrateImage_metadata", PROVENANCE),
    ("computeReliability_config", PROVENANCE),
    ("computeReliability_log", PROVENANCE),
    ("computeReliability_metadata", PROVENANCE),
    ("detectAndMeasureDiaSource_config", PROVENANCE),
    ("detectAndMeasureDiaSource_log", PROVENANCE),
    ("detectAndMeasureDiaSource_metadata", PROVENANCE),
    ("filterDiaSourcePostReliability_config", PROVENANCE),
    ("filterDiaSourcePostReliability_log", PROVENANCE),
    ("filterDiaSourcePostReliability_metadata", PROVENANCE),
    ("filterDiaSource_config", PROVENANCE),
    ("filterDiaSource_log", PROVENANCE),
    ("filterDiaSource_metadata", PROVENANCE),
    ("isr_config", PROVENANCE),
    ("isr_log", PROVENANCE),
    ("isr_metadata", PROVENANCE),
    ("loadDiaCatalogs_config", PROVENANCE),
    ("loadDiaCatalogs_log", PROVENANCE),
    ("loadDiaCatalogs_metadata", PROVENANCE),
    ("mpSkyEphemerisQuery_config", PROVENANCE),
    ("mpSkyEphemerisQuery_log", PROVENANCE),
    ("mpSkyEphemerisQuery_metadata", PROVENANCE),
    ("packages", PROVENANCE),
    ("singleFrameDetectAndMeasure_config", PROVENANCE),
    ("singleFrameDetectAndMeasure_log", PROVENANCE),
    ("singleFrameDetectAndMeasure_metadata", PROVENANCE),
    ("standardizeDiaSource_config", PROVENANCE),
    ("standardizeDiaSource_log", PROVENANCE),
    ("standardizeDiaSource_metadata", PROVENANCE),
    ("subtractImages_config", PROVENANCE),
    ("subtractImages_log", PROVENANCE),
    ("subtractImages_metadata", PROVENANCE),
];

pub fn prompt_processing_outputs() -> PolicyTable {
    PolicyTable::new(PROMPT_PROCESSING_OUTPUTS.iter().copied())
}
