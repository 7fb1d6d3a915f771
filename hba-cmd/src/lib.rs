//! Command implementations for the HBA CLI.
//!
//! Subcommands follow the processing order: build a source catalogue,
//! attribute units, then aggregate upstream or roll up by Pfafstetter level.

use clap::Subcommand;
use hba_data::SummaryType;

pub mod attribute;
pub mod catalogue;
pub mod network;
pub mod rollup;

#[derive(Subcommand)]
pub enum Command {
    /// Build a source catalogue from grid files and a control CSV
    Catalogue {
        /// Directory searched recursively for grid files
        #[arg(short = 'd', long)]
        directory: String,

        /// Control CSV with file_name,label,variable,summary_type[,stats]
        #[arg(short = 'c', long)]
        control: String,

        /// Output path for the catalogue JSON
        #[arg(short = 'o', long)]
        output: String,

        /// Only include files whose names start with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Only include files whose names end with this suffix
        #[arg(long, default_value = ".asc")]
        suffix: String,
    },

    /// Attribute zonal statistics from catalogued grids to spatial units
    Attribute {
        /// Source catalogue JSON
        #[arg(short = 'c', long)]
        catalogue: String,

        /// GeoJSON file of basin or lake units (.gz accepted)
        #[arg(short = 'u', long)]
        units: String,

        /// Output path for the records JSON (.gz to compress)
        #[arg(short = 'o', long)]
        output: String,

        /// Unit identifier property
        #[arg(long, default_value = "HYBAS_ID")]
        id_field: String,

        /// Pfafstetter code property
        #[arg(long, default_value = "PFAF_ID")]
        pfaf_field: String,

        /// Sub-basin area property
        #[arg(long, default_value = "SUB_AREA")]
        area_field: String,

        /// Worker threads (default: all cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Sum or area-weight local values over each basin's upstream network
    Upstream {
        /// Network index database built by network-import
        #[arg(short = 'n', long)]
        network: String,

        /// CSV of per-basin local values
        #[arg(short = 'l', long)]
        local: String,

        /// Basin id column of the local values CSV
        #[arg(long, default_value = "HYBAS_ID")]
        id_column: String,

        /// Columns to aggregate (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Multiply each column by this one before summing (area or length)
        #[arg(long)]
        weight_column: Option<String>,

        /// sum or area_weighted_mean
        #[arg(long, default_value = "sum")]
        summary_type: SummaryType,

        /// Use stored upstream sets as-is instead of adding each basin itself
        #[arg(long)]
        exclude_self: bool,

        /// Output CSV path
        #[arg(short = 'o', long)]
        output: String,

        /// Worker threads (default: all cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Roll attributed records up to a coarser Pfafstetter level
    Rollup {
        /// Records JSON written by attribute
        #[arg(short = 'r', long)]
        records: String,

        /// Target level, 1 to 12 (e.g. 02)
        #[arg(short = 'l', long)]
        level: String,

        /// Output CSV path
        #[arg(short = 'o', long)]
        output: String,
    },

    /// Flatten attributed records into one CSV row per unit
    Flatten {
        /// Records JSON written by attribute
        #[arg(short = 'r', long)]
        records: String,

        /// Output CSV path
        #[arg(short = 'o', long)]
        output: String,
    },

    /// Load a network CSV into the network index database
    NetworkImport {
        /// CSV with basin_id,area,tot_area,pfaf_id,order,up_seg_ids
        #[arg(short = 'i', long)]
        input: String,

        /// Network index database (created if absent)
        #[arg(short = 'n', long)]
        network: String,
    },
}

pub fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Catalogue {
            directory,
            control,
            output,
            prefix,
            suffix,
        } => catalogue::run_catalogue(&directory, &control, &output, prefix.as_deref(), Some(&suffix)),
        Command::Attribute {
            catalogue,
            units,
            output,
            id_field,
            pfaf_field,
            area_field,
            threads,
        } => {
            let fields = hba_data::UnitFields {
                id_field,
                pfaf_field: Some(pfaf_field),
                area_field: Some(area_field),
            };
            attribute::run_attribute(&catalogue, &units, &output, &fields, threads)
        }
        Command::Upstream {
            network,
            local,
            id_column,
            columns,
            weight_column,
            summary_type,
            exclude_self,
            output,
            threads,
        } => {
            let config = hba_data::UpstreamConfig {
                summary_type,
                self_inclusion: if exclude_self {
                    hba_data::SelfInclusion::AsStored
                } else {
                    hba_data::SelfInclusion::Include
                },
                threads,
            };
            network::run_upstream(
                &network,
                &local,
                &id_column,
                &columns,
                weight_column.as_deref(),
                &config,
                &output,
            )
        }
        Command::Rollup {
            records,
            level,
            output,
        } => rollup::run_rollup(&records, &level, &output),
        Command::Flatten { records, output } => rollup::run_flatten(&records, &output),
        Command::NetworkImport { input, network } => network::run_network_import(&input, &network),
    }
}
