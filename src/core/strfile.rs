//! Parse and emit of the three text formats the coordinator touches:
//! the strfile input (also used for `SAVE`, which is a re-parseable
//! superset) and the VASP-style POSCAR handed to workers.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{Matrix3, Point3, Vector3};
use rand::Rng;

use crate::core::chemistry;
use crate::core::domain::{Lattice, Occupation, Structure};

// --- Input scanning ---

/// Cursor over the input text with the two access patterns the format mixes:
/// whitespace-delimited tokens (numbers may span lines) and rest-of-line
/// reads (titles, symbol lists, flags).
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Consumes up to and including the next newline; returns the line
    /// without its terminator. `None` at end of input.
    fn line(&mut self) -> Option<&'a str> {
        if self.pos >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.pos..];
        let line = match rest.find('\n') {
            Some(i) => {
                self.pos += i + 1;
                &rest[..i]
            }
            None => {
                self.pos = self.text.len();
                rest
            }
        };
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Skips whitespace (including newlines) and returns the next token.
    fn token(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        let mut i = self.pos;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            self.pos = i;
            return None;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        self.pos = i;
        Some(&self.text[start..i])
    }

    /// Parses the next token as `T`, naming the field on failure.
    fn value<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let tok = self
            .token()
            .ok_or_else(|| anyhow!("structure file truncated while reading {}", what))?;
        tok.parse::<T>()
            .map_err(|_| anyhow!("cannot parse {} from '{}'", what, tok))
    }
}

fn parse_symbols(line: &str, which: &str) -> Result<Vec<u8>> {
    let mut species = Vec::new();
    for sym in line.split_whitespace() {
        let z = chemistry::atomic_number(sym)
            .ok_or_else(|| anyhow!("unknown {} element symbol '{}'", which, sym))?;
        species.push(z);
    }
    if species.is_empty() {
        bail!("no {} element symbols listed", which);
    }
    Ok(species)
}

// --- Parse ---

/// Reads a structure file from disk. The shuffle flag (if present) consumes
/// randomness from `rng`, which is why parsing borrows the driver's
/// generator.
pub fn read_structure<R: Rng>(path: impl AsRef<Path>, rng: &mut R) -> Result<Structure> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot open structure file {}", path.display()))?;
    parse_structure(&text, rng)
        .with_context(|| format!("malformed structure file {}", path.display()))
}

/// Parses the fixed-order strfile record described in the input format:
/// title, scale, cell, metallic inventory, interstitial inventory, site
/// count, shuffle flag, coordinate mode, then the position blocks.
pub fn parse_structure<R: Rng>(text: &str, rng: &mut R) -> Result<Structure> {
    let mut sc = Scanner::new(text);

    let _title = sc.line().ok_or_else(|| anyhow!("structure file is empty"))?;
    let scale: f64 = sc.value("scale factor")?;

    // Cell vectors, one per line, pre-scale.
    let mut vecs = [Vector3::zeros(); 3];
    for (k, v) in vecs.iter_mut().enumerate() {
        for axis in 0..3 {
            v[axis] = sc.value::<f64>(&format!("cell vector {} component", k + 1))?;
        }
        *v *= scale;
    }
    let cell = Matrix3::from_columns(&vecs);

    // Metallic inventory.
    let _ = sc.line();
    let metal_line = sc
        .line()
        .ok_or_else(|| anyhow!("structure file truncated before metallic species"))?;
    let metal_species = parse_symbols(metal_line, "metallic")?;
    let mut metal_counts = Vec::with_capacity(metal_species.len());
    for _ in 0..metal_species.len() {
        metal_counts.push(sc.value::<usize>("metallic species count")?);
    }

    // Interstitial inventory.
    let _ = sc.line();
    let inter_line = sc
        .line()
        .ok_or_else(|| anyhow!("structure file truncated before interstitial species"))?;
    let inter_species = parse_symbols(inter_line, "interstitial")?;
    let mut inter_counts = Vec::with_capacity(inter_species.len());
    for _ in 0..inter_species.len() {
        inter_counts.push(sc.value::<usize>("interstitial species count")?);
    }

    let num_sites: usize = sc.value("interstitial site count")?;
    let occupied: usize = inter_counts.iter().sum();
    if occupied > num_sites {
        bail!(
            "interstitial counts sum to {} but only {} sites are declared",
            occupied,
            num_sites
        );
    }

    let _ = sc.line();
    let shuffle_line = sc
        .line()
        .ok_or_else(|| anyhow!("structure file truncated before shuffle flag"))?;
    let do_shuffle = shuffle_line == "Shuffle";

    let coord_line = sc
        .line()
        .ok_or_else(|| anyhow!("structure file truncated before coordinate mode"))?;
    let cartesian = matches!(coord_line.chars().next(), Some('C' | 'c' | 'K' | 'k'));

    // Position blocks: metallic atoms in species-block order, then sites.
    let num_metal: usize = metal_counts.iter().sum();
    let metal_positions = read_positions(&mut sc, num_metal, "metallic atom", cartesian, scale, &cell)?;
    let site_positions =
        read_positions(&mut sc, num_sites, "interstitial site", cartesian, scale, &cell)?;

    let lattice = Lattice {
        cell,
        metal_species,
        inter_species,
        metal_positions,
        site_positions,
    };
    let occupation = Occupation::sequential(metal_counts, inter_counts, num_sites);
    let mut structure = Structure { lattice, occupation };

    if do_shuffle {
        structure.shuffle(rng);
    }
    Ok(structure)
}

fn read_positions(
    sc: &mut Scanner,
    count: usize,
    what: &str,
    cartesian: bool,
    scale: f64,
    cell: &Matrix3<f64>,
) -> Result<Vec<Point3<f64>>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let x: f64 = sc.value(&format!("{} position", what))?;
        let y: f64 = sc.value(&format!("{} position", what))?;
        let z: f64 = sc.value(&format!("{} position", what))?;
        let p = if cartesian {
            Point3::new(x * scale, y * scale, z * scale)
        } else {
            // Fractional: linear combination of the scaled cell vectors.
            Point3::from(cell * Vector3::new(x, y, z))
        };
        out.push(p);
    }
    Ok(out)
}

// --- Emit ---

fn title_line(lattice: &Lattice) -> String {
    let mut s = String::new();
    for &z in &lattice.metal_species {
        s.push_str(chemistry::symbol(z).unwrap_or("X"));
    }
    s.push_str(" + ");
    for &z in &lattice.inter_species {
        s.push_str(chemistry::symbol(z).unwrap_or("X"));
    }
    s
}

fn push_cell(out: &mut String, cell: &Matrix3<f64>) {
    for k in 0..3 {
        let _ = writeln!(
            out,
            "{:.9} {:.9} {:.9}",
            cell[(0, k)],
            cell[(1, k)],
            cell[(2, k)]
        );
    }
}

fn push_position(out: &mut String, p: &Point3<f64>) {
    let _ = writeln!(out, "{:.9} {:.9} {:.9}", p.x, p.y, p.z);
}

fn symbols_joined(species: &[u8]) -> String {
    species
        .iter()
        .map(|&z| chemistry::symbol(z).unwrap_or("X"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn counts_joined(counts: &[usize]) -> String {
    counts
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Metallic atoms regrouped by species (index order within each block),
/// followed by occupied interstitial sites regrouped the same way. Empty
/// sites are omitted entirely.
pub fn poscar_string(structure: &Structure) -> String {
    let lat = &structure.lattice;
    let occ = &structure.occupation;
    let mut out = String::new();

    let _ = writeln!(out, "{}", title_line(lat));
    out.push_str("1.0\n");
    push_cell(&mut out, &lat.cell);

    let _ = writeln!(
        out,
        "{} {}",
        symbols_joined(&lat.metal_species),
        symbols_joined(&lat.inter_species)
    );
    let _ = writeln!(
        out,
        "{} {}",
        counts_joined(&occ.metal_counts),
        counts_joined(&occ.inter_counts)
    );
    out.push_str("Cartesian\n");

    for species in 0..lat.metal_species.len() {
        for (i, &t) in occ.metal_types.iter().enumerate() {
            if t == species {
                push_position(&mut out, &lat.metal_positions[i]);
            }
        }
    }
    for species in 0..lat.inter_species.len() {
        for (j, &t) in occ.site_types.iter().enumerate() {
            if t == Some(species) {
                push_position(&mut out, &lat.site_positions[j]);
            }
        }
    }
    out
}

/// Round-trippable superset of the input format. Occupied sites come out
/// grouped by species, empty sites last, so total site count and
/// identity-by-index survive a reload; a reload followed by another emit is
/// byte-identical.
pub fn save_string(structure: &Structure) -> String {
    let lat = &structure.lattice;
    let occ = &structure.occupation;
    let mut out = String::new();

    let _ = writeln!(out, "{}", title_line(lat));
    out.push_str("1.0\n");
    push_cell(&mut out, &lat.cell);

    let _ = writeln!(out, "{}", symbols_joined(&lat.metal_species));
    let _ = writeln!(out, "{}", counts_joined(&occ.metal_counts));
    let _ = writeln!(out, "{}", symbols_joined(&lat.inter_species));
    let _ = writeln!(out, "{}", counts_joined(&occ.inter_counts));
    let _ = writeln!(out, "{}", occ.num_sites());
    out.push_str("No Shuffle\n");
    out.push_str("Cartesian\n");

    for species in 0..lat.metal_species.len() {
        for (i, &t) in occ.metal_types.iter().enumerate() {
            if t == species {
                push_position(&mut out, &lat.metal_positions[i]);
            }
        }
    }
    for species in 0..lat.inter_species.len() {
        for (j, &t) in occ.site_types.iter().enumerate() {
            if t == Some(species) {
                push_position(&mut out, &lat.site_positions[j]);
            }
        }
    }
    for (j, t) in occ.site_types.iter().enumerate() {
        if t.is_none() {
            push_position(&mut out, &lat.site_positions[j]);
        }
    }
    out
}

pub fn write_poscar(structure: &Structure, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, poscar_string(structure))
        .with_context(|| format!("cannot write POSCAR to {}", path.display()))
}

pub fn write_save(structure: &Structure, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, save_string(structure))
        .with_context(|| format!("cannot write SAVE to {}", path.display()))
}
