//! VPD text writer (CRLF, six decimals)

use super::{VPD_MAGIC, VpdDocument};

const CRLF: &str = "\r\n";

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}

impl VpdDocument {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        push_line(&mut out, VPD_MAGIC);
        push_line(&mut out, "");
        push_line(&mut out, &format!("{};\t\t// 親ファイル名", self.model_name));
        push_line(&mut out, &format!("{};\t\t\t\t// 総ポーズボーン数", self.bones.len()));
        push_line(&mut out, "");

        for (i, bone) in self.bones.iter().enumerate() {
            let l = bone.location;
            let q = bone.rotation;
            push_line(&mut out, &format!("Bone{i}{{{}", bone.name));
            push_line(&mut out, &format!("  {:.6},{:.6},{:.6};\t\t\t\t// trans x,y,z", l.x, l.y, l.z));
            push_line(
                &mut out,
                &format!("  {:.6},{:.6},{:.6},{:.6};\t\t// Quaternion x,y,z,w", q.x, q.y, q.z, q.w),
            );
            push_line(&mut out, "}");
            push_line(&mut out, "");
        }

        for (i, morph) in self.morphs.iter().enumerate() {
            push_line(&mut out, &format!("Morph{i}{{{}", morph.name));
            push_line(&mut out, &format!("  {:.6};\t\t\t\t\t\t// weight", morph.weight));
            push_line(&mut out, "}");
            push_line(&mut out, "");
        }
        out
    }
}
