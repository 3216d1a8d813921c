// tests/common/mod.rs
#![allow(dead_code)]

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use moortune::io::outb::{FileFormat, OutbFile};
use moortune::io::runner::{Simulator, SimulatorError};
use moortune::io::template::Template;
use moortune::platform::Platform;

pub const MOORDYN: &str = "\
--------------------- MoorDyn Input File ------------------------------------
Mooring system for OC3-Hywind
FALSE    Echo      - echo the input file data (flag)
----------------------- LINE TYPES ------------------------------------------
1        NTypes    - number of LineTypes
Name     Diam      MassDen   EA        BA/-zeta   Can    Cat    Cdn    Cdt
(-)      (m)       (kg/m)    (N)       (N-s/-)    (-)    (-)    (-)    (-)
main     0.09      77.7066   384.243E6 -0.8       1.0    0.0    1.6    0.1
---------------------- CONNECTION PROPERTIES --------------------------------
6        NConnects - number of connections including anchors and fairleads
Node     Type      X         Y         Z         M      V      FX     FY     FZ     CdA   CA
(-)      (-)       (m)       (m)       (m)       (kg)   (m^3)  (kN)   (kN)   (kN)   (m^2) (-)
1        Fixed     853.87    0.0       -320.0    0      0      0      0      0      0     0
2        Fixed     -426.935  739.47    -320.0    0      0      0      0      0      0     0
3        Fixed     -426.935  -739.47   -320.0    0      0      0      0      0      0     0
4        Vessel    5.2       0.0       -70.0     0      0      0      0      0      0     0
5        Vessel    -2.6      4.5       -70.0     0      0      0      0      0      0     0
6        Vessel    -2.6      -4.5      -70.0     0      0      0      0      0      0     0
---------------------- LINE PROPERTIES --------------------------------------
3        NLines    - number of line objects
Line     LineType  UnstrLen  NumSegs   NodeAnch  NodeFair  Flags/Outputs
(-)      (-)       (m)       (-)       (-)       (-)       (-)
1        main      902.2     20        1         4         p
2        main      902.2     20        2         5         p
3        main      902.2     20        3         6         p
---------------------- SOLVER OPTIONS ---------------------------------------
0.001    dtM       - time step to use in mooring integration (s)
3.0e6    kbot      - bottom stiffness (Pa/m)
3.0e5    cbot      - bottom damping (Pa-s/m)
2.0      dtIC      - time interval for analyzing convergence during IC gen (s)
60.0     TmaxIC    - max time for ic gen (s)
------------------------ OUTPUTS --------------------------------------------
FairTen1
FairTen2
FairTen3
END
------------------------- need this line --------------------------------------
";

pub const HYDRODYN: &str = "\
------- HydroDyn v2.03.* Input File --------------------------------------------
NREL 5.0 MW offshore baseline floating platform HydroDyn input properties for the OC3 Hywind.
False            Echo           - Echo the input file data (flag)
---------------------- ENVIRONMENTAL CONDITIONS --------------------------------
             1025   WtrDens        - Water density (kg/m^3)
              320   WtrDpth        - Water depth (meters)
                0   MSL2SWL        - Offset between still-water level and mean sea level (meters) [positive upward]
---------------------- WAVES ---------------------------------------------------
                0   WaveMod        - Incident wave kinematics model {0: none=still water}
---------------------- FLOATING PLATFORM ---------------------------------------
                1   PotMod         - Potential-flow model {0: none, 1: WAMIT} (switch)
\"HydroData/Spar\"    PotFile        - Root name of potential-flow model data (quoted string)
";

fn fst(title: &str) -> String {
    format!(
        "\
------- OpenFAST INPUT FILE -------------------------------------------
{title}
---------------------- SIMULATION CONTROL --------------------------------------
False         Echo            - Echo input data to <RootName>.ech (flag)
\"FATAL\"       AbortLevel      - Error level when simulation should abort (string) {{\"WARNING\", \"SEVERE\", \"FATAL\"}}
        600   TMax            - Total run time (s)
     0.0125   DT              - Recommended module time step (s)
---------------------- FEATURE SWITCHES AND FLAGS ------------------------------
          1   CompElast       - Compute structural dynamics (switch) {{1=ElastoDyn}}
          1   CompHydro       - Compute hydrodynamic loads (switch) {{0=None; 1=HydroDyn}}
          3   CompMooring     - Compute mooring system (switch) {{0=None; 3=MoorDyn}}
---------------------- INPUT FILES ---------------------------------------------
\"OC3Hywind_ElastoDyn.dat\"    EDFile          - Name of file containing ElastoDyn input parameters (quoted string)
\"unused\"      BDBldFile(1)    - Name of file containing BeamDyn input parameters for blade 1 (quoted string)
\"OC3Hywind_HydroDyn.dat\"    HydroFile       - Name of file containing hydrodynamic input parameters (quoted string)
\"unused\"      SubFile         - Name of file containing sub-structural input parameters (quoted string)
\"OC3Hywind_MoorDyn.dat\"    MooringFile     - Name of file containing mooring system input parameters (quoted string)
---------------------- OUTPUT --------------------------------------------------
True          SumPrint        - Print summary data to \"<RootName>.sum\" (flag)
          2   OutFileFmt      - Format for tabular (time-marching) output file (switch) {{2: binary file}}
"
    )
}

pub fn rough_fst() -> String {
    fst("OC3 Hywind rough sizing run")
}

pub fn fine_fst() -> String {
    fst("OC3 Hywind free decay in surge")
}

/// Writes the platform's four templates into `dir`.
pub fn write_templates(dir: &Path, platform: &Platform) {
    let t = &platform.templates;
    fs::write(dir.join(t.moordyn), MOORDYN).unwrap();
    fs::write(dir.join(t.hydrodyn), HYDRODYN).unwrap();
    fs::write(dir.join(t.rough_fst), rough_fst()).unwrap();
    fs::write(dir.join(t.fine_fst), fine_fst()).unwrap();
}

pub const DT: f64 = 0.1;
pub const SAMPLES: usize = 6000;

pub fn time_axis(n: usize, dt: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 * dt).collect()
}

/// Damped surge decay at `freq` Hz.
pub fn surge_decay(time: &[f64], freq: f64) -> Vec<f64> {
    time.iter().map(|t| 2.0 * (-0.01 * t).exp() * (2.0 * PI * freq * t).cos()).collect()
}

/// Writes `Time` plus the named columns.
pub fn write_outb(path: &Path, names: &[&str], time: &[f64], columns: &[Vec<f64>], format: FileFormat) {
    let mut channels = vec!["Time".to_string()];
    channels.extend(names.iter().map(|n| n.to_string()));
    let mut units = vec!["s".to_string()];
    units.extend(names.iter().map(|_| "m".to_string()));
    let mut data = Vec::with_capacity(time.len() * channels.len());
    for (i, t) in time.iter().enumerate() {
        data.push(*t);
        data.extend(columns.iter().map(|c| c[i]));
    }
    OutbFile::new("Predictions were generated by a test stub", channels, units, data)
        .write(path, format)
        .unwrap();
}

/// Stand-in for the simulator executable.
///
/// Rough runs lift the anchor nodes below the seabed while the line is
/// shorter than `uplift_free_length`. Fine runs oscillate at
/// `baseline_frequency + slope · (length − target_length)`.
#[derive(Debug)]
pub struct StubFast {
    pub uplift_free_length: f64,
    pub target_length: f64,
    pub baseline_frequency: f64,
    pub slope: f64,
    /// (`.fst` file name, UnstrLen, WtrDpth) per run.
    pub runs: Vec<(String, f64, f64)>,
}

impl StubFast {
    pub fn new(uplift_free_length: f64, target_length: f64, baseline_frequency: f64) -> Self {
        Self { uplift_free_length, target_length, baseline_frequency, slope: 0.001, runs: Vec::new() }
    }
}

fn unquote(s: &str) -> PathBuf {
    PathBuf::from(s.trim_matches('"'))
}

impl Simulator for StubFast {
    fn run(&mut self, input: &Path) -> Result<PathBuf, SimulatorError> {
        let main = Template::load(input).unwrap();
        let moordyn = Template::load(unquote(main.row_value("MooringFile").unwrap())).unwrap();
        let hydro = Template::load(unquote(main.row_value("HydroFile").unwrap())).unwrap();

        let length: f64 = moordyn.column_value("UnstrLen", Some("1")).unwrap().parse().unwrap();
        let depth: f64 = hydro.row_value("WtrDpth").unwrap().parse().unwrap();
        let anchor_z: f64 = moordyn.column_value("Z", Some("1")).unwrap().parse().unwrap();
        assert_eq!(anchor_z, -depth, "anchor depth and water depth disagree");

        let name = input.file_name().unwrap().to_string_lossy().into_owned();
        self.runs.push((name.clone(), length, depth));

        let time = time_axis(SAMPLES, DT);
        let out = input.with_extension("outb");
        if name.starts_with("rough") {
            let lift = if length < self.uplift_free_length { 0.5 } else { 0.0 };
            let z: Vec<f64> = (0..SAMPLES).map(|i| if i % 100 == 50 { -depth - lift } else { -depth }).collect();
            write_outb(
                &out,
                &["L1N1PZ", "L2N1PZ", "L3N1PZ"],
                &time,
                &[z.clone(), z.clone(), z],
                FileFormat::NoCompressWithoutTime,
            );
        } else {
            let freq = self.baseline_frequency + self.slope * (length - self.target_length);
            write_outb(&out, &["PtfmSurge"], &time, &[surge_decay(&time, freq)], FileFormat::NoCompressWithoutTime);
        }
        Ok(out)
    }
}
