use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};

use clap::{arg, crate_version, Command};

use dictcodec::dsl::{DslEntry, DslWriter, ResourceSink};
use dictcodec::duden::{self, convert_dictionary};
use dictcodec::langcodes;
use dictcodec::lsd::heading::group_headings_for_output;
use dictcodec::lsd::LsdDictionary;

const RCH: &str = "unreachable was reached";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let long_help = "Examples:
---------
Convert an LSD dictionary to DSL:    `dictcodec lsd-to-dsl -i my_dict.lsd -o my_dict.dsl`
Convert a Duden dictionary to DSL:   `dictcodec duden-to-dsl -i my_dict.inf -o my_dict.dsl`";

    let mut main_cmd = Command::new("dictcodec")
        .about("Decode Lingvo LSD/LSA and Duden dictionary archives into DSL")
        .after_long_help(long_help)
        .version(crate_version!());

    main_cmd = main_cmd.subcommand(
        Command::new("lsd-to-dsl")
            .arg(arg!(-i --input <PATH> "input .lsd/.lsa path").required(true))
            .arg(arg!(-o --output <PATH> "output .dsl path").required(true))
            .about("convert a Lingvo LSD/LSA dictionary to DSL"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("duden-to-dsl")
            .arg(arg!(-i --input <PATH> "input .inf path").required(true))
            .arg(arg!(-o --output <PATH> "output .dsl path").required(true))
            .about("convert a Duden dictionary to DSL"),
    );

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("lsd-to-dsl") {
        let path_in = PathBuf::from(cmd.get_one::<String>("input").expect(RCH));
        let path_out = PathBuf::from(cmd.get_one::<String>("output").expect(RCH));
        convert_lsd(&path_in, &path_out)?;
    }
    if let Some(cmd) = matches.subcommand_matches("duden-to-dsl") {
        let path_in = PathBuf::from(cmd.get_one::<String>("input").expect(RCH));
        let path_out = PathBuf::from(cmd.get_one::<String>("output").expect(RCH));
        convert_duden(&path_in, &path_out)?;
    }

    Ok(())
}

fn convert_lsd(path_in: &PathBuf, path_out: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("opening {}", path_in.display());
    let file = File::open(path_in)?;
    let mut dict = LsdDictionary::open(file)?;
    log::info!("{} ({:?})", dict.name, dict.dialect);

    let source_language = langcodes::name_for_lingvo_code(dict.header.source_language);
    let target_language = langcodes::name_for_lingvo_code(dict.header.target_language);

    let headings = dict.all_headings()?;
    log::info!("{} headings after variant collapse", headings.len());
    let entries = group_headings_for_output(&headings);

    let mut resources: Vec<(String, Vec<u8>)> = Vec::new();
    match dict.overlay_resources() {
        Ok(res) => {
            log::info!("{} overlay resources", res.len());
            for (name, bytes) in res {
                resources.add_resource(&name, &bytes);
            }
        }
        Err(e) => log::warn!("failed to read overlay resources: {e}"),
    }

    let stem = path_out.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "dict".into());
    let out_dir = path_out.parent().map(Path::to_path_buf).unwrap_or_default();

    if !dict.icon.is_empty() {
        let bmp_path = out_dir.join(format!("{stem}.bmp"));
        fs::write(&bmp_path, &dict.icon)?;
        log::info!("wrote {}", bmp_path.display());
    }

    match dict.annotation() {
        Ok(ann) if !ann.is_empty() => {
            let ann_path = out_dir.join(format!("{stem}.ann"));
            let mut out = BufWriter::new(File::create(&ann_path)?);
            write_utf16le_bom_text(&mut out, &ann)?;
            log::info!("wrote {}", ann_path.display());
        }
        Ok(_) => {}
        Err(e) => log::warn!("failed to read annotation: {e}"),
    }

    for (name, bytes) in &resources {
        let res_path = out_dir.join(name);
        fs::write(&res_path, bytes)?;
    }

    let out = BufWriter::new(File::create(path_out)?);
    let mut writer = DslWriter::new(out);
    writer.write_header(&dict.name, &source_language, &target_language)?;
    if !dict.icon.is_empty() {
        writer.write_icon_file(&format!("{stem}.bmp"))?;
    }
    for (offset, headings) in &entries {
        let article = dict.decode_article_at(*offset as u64)?;
        let body = dictcodec::lsd::dialect::to_display_string(&article);
        writer.write_entry(&DslEntry { headings, body: &body })?;
    }

    Ok(())
}

fn write_utf16le_bom_text<W: std::io::Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(&[0xFF, 0xFE])?;
    for unit in text.encode_utf16() {
        out.write_all(&unit.to_le_bytes())?;
    }
    Ok(())
}

/// Resolve a filename an `.inf` group names against its own directory,
/// falling back to a case-insensitive scan -- Duden dictionaries are
/// commonly unpacked on case-sensitive filesystems with filenames that
/// don't match the `.inf`'s recorded case exactly.
fn resolve_sibling(dir: &Path, name: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Ok(exact);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) {
            return Ok(entry.path());
        }
    }
    Err(format!("could not find {name:?} alongside {}", dir.display()).into())
}

fn convert_duden(path_in: &PathBuf, path_out: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("opening {}", path_in.display());
    let inf_text = fs::read_to_string(path_in)?;
    let inf = duden::parse_inf(&inf_text)?;
    let dir = path_in.parent().map(Path::to_path_buf).unwrap_or_default();

    let dict = inf
        .dictionaries
        .first()
        .ok_or("'.inf' file names no dictionary groups")?;
    log::info!("{} ({} resource archives)", dict.title, dict.resources.len());

    let hic_path = resolve_sibling(&dir, &dict.hic_name)?;
    let bof_path = resolve_sibling(&dir, &dict.bof_name)?;
    let idx_path = resolve_sibling(&dir, &dict.idx_name)?;
    let ld_path = dir.join(format!("{}.ld", strip_ext(&dict.hic_name)));
    let ld_text = fs::read_to_string(&ld_path).unwrap_or_default();
    if ld_text.is_empty() {
        log::warn!("no .ld reference table found at {}; cross-references will be left unresolved", ld_path.display());
    }

    let hic = File::open(&hic_path)?;
    let bof = File::open(&bof_path)?;
    let mut idx_data = Vec::new();
    File::open(&idx_path)?.read_to_end(&mut idx_data)?;

    let articles = convert_dictionary(hic, bof, &idx_data, &ld_text)?;
    log::info!("{} articles", articles.len());

    let out = BufWriter::new(File::create(path_out)?);
    let mut writer = DslWriter::new(out);
    // Duden dictionaries are monolingual German reference works; `.inf`
    // carries no language metadata of its own to normalize via `langcodes`.
    writer.write_header(&dict.title, "German", "German")?;
    for article in &articles {
        writer.write_entry(&DslEntry { headings: &article.headings, body: &article.body })?;
    }

    let out_dir = path_out.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut resource_count = 0usize;
    for resource in &dict.resources {
        let Some(fsi_name) = &resource.fsi_name else {
            log::warn!("resource archive {} has no .fsi directory; skipping", resource.bof_name);
            continue;
        };
        let resolved = resolve_sibling(&dir, &resource.bof_name)
            .and_then(|bof| Ok((bof, resolve_sibling(&dir, &resource.idx_name)?)))
            .and_then(|(bof, idx)| Ok((bof, idx, resolve_sibling(&dir, fsi_name)?)));
        let (bof_path, idx_path, fsi_path) = match resolved {
            Ok(paths) => paths,
            Err(e) => {
                log::warn!("skipping resource archive {}: {e}", resource.bof_name);
                continue;
            }
        };

        let fsi_entries = duden::parse_fsi(File::open(&fsi_path)?)?;
        log::info!("{} named resources in {}", fsi_entries.len(), fsi_name);

        let mut idx_data = Vec::new();
        File::open(&idx_path)?.read_to_end(&mut idx_data)?;
        let index = duden::Archive::<File>::parse_index(&idx_data)?;
        let mut archive = duden::Archive::new(File::open(&bof_path)?, index)?;

        for entry in &fsi_entries {
            let bytes = archive.read(entry.offset, entry.size)?;
            fs::write(out_dir.join(&entry.name), &bytes)?;
            resource_count += 1;
        }
    }
    log::info!("unpacked {resource_count} resource files");

    Ok(())
}

fn strip_ext(name: &str) -> String {
    match name.rfind('.') {
        Some(i) => name[..i].to_string(),
        None => name.to_string(),
    }
}
