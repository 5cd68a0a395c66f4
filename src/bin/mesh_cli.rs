#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("mesh_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use klein_engine::geom::{
        GeomContext, GeomMesh, KleinFigure, ParametricSurface, TessellationOptions,
        tessellate_with_context,
    };
    use klein_engine::texture::{FileImageFetcher, TextureSampling, load_pyramid};
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"mesh_cli (klein-engine)

USAGE:
  mesh_cli tessellate [options]
  mesh_cli sample <u> <v>
  mesh_cli pyramid <root> <template> <max-level>

OPTIONS (tessellate):
  --slices <n>       Cells along u (default 15)
  --stacks <n>       Cells along v (default 15)
  --repeat <r>       UV repeat factor (default 1)
  --obj <path>       Write the mesh as Wavefront OBJ
  --overwrite        Overwrite an existing OBJ file
  -h, --help         Show this help

PYRAMID:
  <template> must contain `{size}`; level k is read from the template with
  `{size}` = 2^(max-level - k), relative to <root>.
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "tessellate" => cmd_tessellate(&mut args),
            "sample" => cmd_sample(&mut args),
            "pyramid" => cmd_pyramid(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn cmd_tessellate(args: &mut Args) -> Result<(), String> {
        let mut options = TessellationOptions::default();
        let mut obj_path: Option<PathBuf> = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--slices" => options.slices = args.parsed("--slices")?,
                "--stacks" => options.stacks = args.parsed("--stacks")?,
                "--repeat" => options.uv_repeat = args.parsed("--repeat")?,
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let mut ctx = GeomContext::new();
        let (mesh, diag) = tessellate_with_context(&KleinFigure, options, &mut ctx)
            .map_err(|e| e.to_string())?;

        println!("{diag}");
        if let Some(bounds) = mesh.bounds() {
            let size = bounds.size();
            println!(
                "bounds: min=({:.4}, {:.4}, {:.4}) size=({:.4}, {:.4}, {:.4})",
                bounds.min.x, bounds.min.y, bounds.min.z, size.x, size.y, size.z
            );
        }

        if let Some(path) = obj_path {
            write_obj_file(&path, &mesh, "klein", overwrite)?;
            println!("wrote {}", path.display());
        }
        Ok(())
    }

    fn cmd_sample(args: &mut Args) -> Result<(), String> {
        let u: f64 = args.parsed("<u>")?;
        let v: f64 = args.parsed("<v>")?;

        let klein = KleinFigure::new();
        let p = klein.position(u, v);
        let t = klein.tangents(u, v);
        println!("position: ({}, {}, {})", p.x, p.y, p.z);
        println!("du:       ({}, {}, {})", t.du.x, t.du.y, t.du.z);
        println!("dv:       ({}, {}, {})", t.dv.x, t.dv.y, t.dv.z);
        match klein.unit_normal(u, v) {
            Some(n) => println!("normal:   ({}, {}, {})", n.x, n.y, n.z),
            None => println!("normal:   degenerate"),
        }
        Ok(())
    }

    fn cmd_pyramid(args: &mut Args) -> Result<(), String> {
        let root = PathBuf::from(args.value("<root>")?);
        let template = args.value("<template>")?;
        let max_level: u32 = args.parsed("<max-level>")?;

        let fetcher = FileImageFetcher::new(root);
        let pyramid = futures::executor::block_on(load_pyramid(
            &fetcher,
            &template,
            max_level,
            TextureSampling::default(),
        ))
        .map_err(|e| e.to_string())?;

        for level in 0..pyramid.level_count() {
            if let Some((w, h)) = pyramid.level_extent(level) {
                println!("level {level}: {w}x{h}");
            }
        }
        Ok(())
    }

    fn write_obj_file(path: &Path, mesh: &GeomMesh, name: &str, overwrite: bool) -> Result<(), String> {
        mesh.validate().map_err(|e| format!("mesh validation failed: {e}"))?;

        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);

        writeln!(w, "# klein-engine mesh_cli").map_err(|e| format!("write obj: {e}"))?;
        writeln!(w, "o {name}").map_err(|e| format!("write obj: {e}"))?;

        for p in &mesh.positions {
            writeln!(w, "v {} {} {}", p[0], p[1], p[2]).map_err(|e| format!("write obj: {e}"))?;
        }
        for uv in &mesh.uvs {
            writeln!(w, "vt {} {}", uv[0], uv[1]).map_err(|e| format!("write obj: {e}"))?;
        }
        for n in &mesh.normals {
            writeln!(w, "vn {} {} {}", n[0], n[1], n[2]).map_err(|e| format!("write obj: {e}"))?;
        }

        for [a, b, c] in mesh.triangles() {
            let (a, b, c) = (a + 1, b + 1, c + 1);
            writeln!(w, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")
                .map_err(|e| format!("write obj: {e}"))?;
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }

        fn parsed<T: std::str::FromStr>(&mut self, flag: &str) -> Result<T, String>
        where
            T::Err: std::fmt::Display,
        {
            let raw = self.value(flag)?;
            raw.parse()
                .map_err(|e| format!("invalid value `{raw}` for {flag}: {e}"))
        }
    }
}
